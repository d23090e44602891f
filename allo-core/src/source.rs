//! The contract for the external store that supplies raw tabular records.
//!
//! A read names a table, the columns wanted, equality filters
//! (`column IN values`) and an optional inclusive date window on one column.
//! Rows come back as column-name keyed maps of loosely typed values.

use crate::date_range::parse_date;
use crate::error::{AlloError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single cell value as returned by a source store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as filter text. Null renders as an empty string.
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

/// An inclusive date window applied to one date column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFilter {
    pub column: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// One read request against a source store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub table: String,
    /// Columns to return; empty means every column.
    pub columns: Vec<String>,
    /// Each entry keeps rows whose column value is one of the listed values.
    pub filters: BTreeMap<String, Vec<Value>>,
    pub date_range: Option<DateFilter>,
}

impl SourceQuery {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.insert(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Merge caller-supplied equality filters into this query.
    pub fn with_filters(mut self, filters: &BTreeMap<String, Vec<String>>) -> Self {
        for (column, values) in filters {
            self = self.filter(column, values.iter().map(String::as_str));
        }
        self
    }

    pub fn date_range(
        mut self,
        column: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Self {
        self.date_range = Some(DateFilter {
            column: column.to_string(),
            from,
            to,
        });
        self
    }
}

/// A row returned by a source store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub table: String,
    pub values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, column: &str, value: Value) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column).filter(|v| !v.is_null())
    }

    fn missing(&self, column: &str) -> AlloError {
        AlloError::MissingField {
            table: self.table.clone(),
            field: column.to_string(),
        }
    }

    fn invalid(column: &str, value: &Value) -> AlloError {
        AlloError::InvalidValue {
            field: column.to_string(),
            value: value.as_text(),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)
            .and_then(|v| v.ok_or_else(|| self.missing(column)))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        Ok(self.get(column).map(|v| v.as_text().trim().to_string()))
    }

    pub fn opt_f64(&self, column: &str) -> Result<Option<f64>> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i as f64)),
            Some(Value::Real(f)) => Ok(Some(*f)),
            Some(Value::Text(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse()
                    .map(Some)
                    .map_err(|_| Self::invalid(column, &Value::Text(s.clone())))
            }
            Some(Value::Null) => Ok(None),
        }
    }

    pub fn f64(&self, column: &str) -> Result<f64> {
        self.opt_f64(column)
            .and_then(|v| v.ok_or_else(|| self.missing(column)))
    }

    pub fn opt_i64(&self, column: &str) -> Result<Option<i64>> {
        match self.opt_f64(column)? {
            None => Ok(None),
            Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
            Some(f) => Err(Self::invalid(column, &Value::Real(f))),
        }
    }

    /// Booleans are stored as 0/1 integers or as text (`true`, `yes`, `1`).
    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>> {
        match self.get(column) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i != 0)),
            Some(Value::Real(f)) => Ok(Some(*f != 0.0)),
            Some(Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "1" | "true" | "yes" | "y" => Ok(Some(true)),
                "0" | "false" | "no" | "n" => Ok(Some(false)),
                _ => Err(Self::invalid(column, &Value::Text(s.clone()))),
            },
            Some(Value::Null) => Ok(None),
        }
    }

    /// Unparseable dates read as missing, like a coercing datetime cast.
    pub fn opt_date(&self, column: &str) -> Option<NaiveDate> {
        self.get(column).and_then(|v| {
            let text = v.as_text();
            // tolerate a trailing time component
            let day = text.split_whitespace().next().unwrap_or("");
            parse_date(day).ok()
        })
    }
}

/// Supplies raw tabular records on demand.
///
/// Implementations are blocking; any retry or timeout policy belongs to the
/// caller. A store value identifies one connection.
pub trait SourceStore {
    fn read(&self, query: &SourceQuery) -> Result<Vec<Row>>;
}

impl<S: SourceStore + ?Sized> SourceStore for &S {
    fn read(&self, query: &SourceQuery) -> Result<Vec<Row>> {
        (**self).read(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new("crc_allo")
            .with("crc", Value::Text(" CRC001 ".into()))
            .with("daily_vol", Value::Text("12.5".into()))
            .with("feav", Value::Integer(3650))
            .with("max_rate", Value::Null)
            .with("in_gw_allo", Value::Text("True".into()))
            .with("from_date", Value::Text("2019-07-01 00:00:00".into()))
            .with("to_date", Value::Text("not a date".into()))
    }

    #[test]
    fn test_typed_getters() {
        let r = row();
        assert_eq!(r.text("crc").unwrap(), "CRC001");
        assert_eq!(r.opt_f64("daily_vol").unwrap(), Some(12.5));
        assert_eq!(r.f64("feav").unwrap(), 3650.0);
        assert_eq!(r.opt_f64("max_rate").unwrap(), None);
        assert_eq!(r.opt_bool("in_gw_allo").unwrap(), Some(true));
        assert_eq!(
            r.opt_date("from_date"),
            NaiveDate::from_ymd_opt(2019, 7, 1)
        );
        assert_eq!(r.opt_date("to_date"), None);
    }

    #[test]
    fn test_missing_field_errors() {
        let r = row();
        assert!(matches!(
            r.f64("max_rate"),
            Err(AlloError::MissingField { .. })
        ));
        assert!(matches!(
            r.text("wap"),
            Err(AlloError::MissingField { .. })
        ));
    }

    #[test]
    fn test_query_builder() {
        let mut filters = BTreeMap::new();
        filters.insert("use_type".to_string(), vec!["irrigation".to_string()]);
        let q = SourceQuery::table("crc_allo")
            .columns(["crc", "take_type"])
            .filter("crc", ["CRC001", "CRC002"])
            .with_filters(&filters)
            .date_range("from_date", None, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(q.table, "crc_allo");
        assert_eq!(q.columns.len(), 2);
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters["crc"][1], Value::Text("CRC002".into()));
        assert_eq!(q.date_range.unwrap().column, "from_date");
    }
}
