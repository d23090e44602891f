//! Generic table reads answering [`SourceQuery`] requests.
//!
//! Table and column names are checked against the live schema before any
//! SQL is built, so only known identifiers reach the statement text. Filter
//! values and date bounds are always bound as parameters.

use crate::Database;
use allo_core::date_range::format_date;
use allo_core::error::{AlloError, Result};
use allo_core::source::{Row, SourceQuery, SourceStore, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::params_from_iter;

fn store_err(e: rusqlite::Error) -> AlloError {
    AlloError::Store(e.to_string())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
    }
}

impl Database {
    /// Column names of `table`, in schema order. Empty for an unknown table.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.conn.borrow();
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(store_err)?;
        let columns = stmt
            .query_map([table], |row| row.get(0))
            .map_err(store_err)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(store_err)?;
        Ok(columns)
    }

    fn build_select(&self, query: &SourceQuery) -> Result<(String, Vec<String>, Vec<SqlValue>)> {
        let known = self.table_columns(&query.table)?;
        if known.is_empty() {
            return Err(AlloError::Store(format!("unknown table '{}'", query.table)));
        }
        let check = |column: &str| -> Result<String> {
            if known.iter().any(|k| k == column) {
                Ok(format!("\"{column}\""))
            } else {
                Err(AlloError::UnknownColumn(format!("{}.{}", query.table, column)))
            }
        };

        let selected = if query.columns.is_empty() {
            known.clone()
        } else {
            query.columns.clone()
        };
        let select_list = selected
            .iter()
            .map(|c| check(c.as_str()))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        let mut clauses = Vec::new();
        let mut params = Vec::new();
        for (column, values) in &query.filters {
            let column = check(column.as_str())?;
            if values.is_empty() {
                clauses.push("0".to_string());
                continue;
            }
            let start = params.len() + 1;
            let slots = (start..start + values.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            clauses.push(format!("{column} IN ({slots})"));
            params.extend(values.iter().map(to_sql));
        }
        if let Some(range) = &query.date_range {
            // stored dates may carry a time of day
            let column = format!("substr({}, 1, 10)", check(range.column.as_str())?);
            if let Some(from) = range.from {
                params.push(SqlValue::Text(format_date(&from)));
                clauses.push(format!("{column} >= ?{}", params.len()));
            }
            if let Some(to) = range.to {
                params.push(SqlValue::Text(format_date(&to)));
                clauses.push(format!("{column} <= ?{}", params.len()));
            }
        }

        let mut sql = format!("SELECT {select_list} FROM {}", query.table);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");
        Ok((sql, selected, params))
    }
}

impl SourceStore for Database {
    fn read(&self, query: &SourceQuery) -> Result<Vec<Row>> {
        let (sql, columns, params) = self.build_select(query)?;
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut out = Row::new(&query.table);
                for (i, column) in columns.iter().enumerate() {
                    out.values.insert(column.clone(), from_sql(row.get_ref(i)?));
                }
                Ok(out)
            })
            .map_err(store_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_err)?;
        log::info!(
            "query: read {} returned {} records",
            query.table,
            rows.len()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use allo_core::error::AlloError;
    use allo_core::source::{SourceQuery, SourceStore, Value};
    use chrono::NaiveDate;

    fn db() -> Database {
        let db = Database::new().unwrap();
        db.load_table(
            "ts_data",
            "\
ext_site_id,dataset_type_id,date_time,value
BS28/5006,9,2020-01-01 00:00:00,12.5
BS28/5006,9,2020-01-02 00:00:00,
BS28/5006,9,2020-02-01 00:00:00,3
BS28/5007,12,2020-01-01 00:00:00,7
",
        )
        .unwrap();
        db
    }

    #[test]
    fn read_all_columns() {
        let rows = db().read(&SourceQuery::table("ts_data")).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].table, "ts_data");
        assert_eq!(rows[0].values.len(), 4);
        assert_eq!(rows[0].get("value"), Some(&Value::Real(12.5)));
        assert_eq!(rows[1].get("value"), None);
        assert_eq!(rows[0].get("dataset_type_id"), Some(&Value::Integer(9)));
    }

    #[test]
    fn read_with_filters_and_dates() {
        let query = SourceQuery::table("ts_data")
            .columns(["ext_site_id", "date_time", "value"])
            .filter("ext_site_id", ["BS28/5006"])
            .filter("dataset_type_id", ["9", "10"])
            .date_range(
                "date_time",
                NaiveDate::from_ymd_opt(2020, 1, 1),
                NaiveDate::from_ymd_opt(2020, 1, 31),
            );
        let rows = db().read(&query).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.values.len() == 3));
        assert_eq!(
            rows[0].opt_date("date_time"),
            NaiveDate::from_ymd_opt(2020, 1, 1)
        );
    }

    #[test]
    fn read_with_empty_filter_returns_nothing() {
        let query = SourceQuery::table("ts_data").filter("ext_site_id", Vec::<String>::new());
        assert!(db().read(&query).unwrap().is_empty());
    }

    #[test]
    fn read_rejects_unknown_identifiers() {
        let store = db();
        assert!(matches!(
            store.read(&SourceQuery::table("ts_data").columns(["bogus"])),
            Err(AlloError::UnknownColumn(_))
        ));
        assert!(matches!(
            store.read(&SourceQuery::table("ts_data; DROP TABLE sites")),
            Err(AlloError::Store(_))
        ));
    }
}
