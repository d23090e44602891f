use crate::error::{AlloError, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Date format used for dates in the source tables and output: "YYYY-MM-DD"
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Start of the horizon when the caller does not bound it.
pub const UNBOUNDED_START: (i32, u32, u32) = (1900, 1, 1);

/// The caller's overall date range of interest, both ends inclusive.
///
/// `bounded` is false when the caller omitted both ends; the horizon then
/// spans 1900-01-01 through today and horizon-overlap filtering is skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub bounded: bool,
}

impl Horizon {
    /// Build a horizon from optional ends. Both or neither must be given.
    pub fn new(from_date: Option<NaiveDate>, to_date: Option<NaiveDate>) -> Result<Self> {
        match (from_date, to_date) {
            (Some(start), Some(end)) => {
                if start > end {
                    return Err(AlloError::InvalidDateRange(format!(
                        "from_date {start} is after to_date {end}"
                    )));
                }
                Ok(Self {
                    start,
                    end,
                    bounded: true,
                })
            }
            (None, None) => {
                let (y, m, d) = UNBOUNDED_START;
                let start = NaiveDate::from_ymd_opt(y, m, d)
                    .ok_or_else(|| AlloError::InvalidDateRange("bad unbounded start".into()))?;
                Ok(Self {
                    start,
                    end: Local::now().naive_local().date(),
                    bounded: false,
                })
            }
            _ => Err(AlloError::InvalidDateRange(
                "from_date and to_date must both be given or both omitted".into(),
            )),
        }
    }

    /// Parse optional "YYYY-MM-DD" strings into a horizon.
    pub fn parse(from_date: Option<&str>, to_date: Option<&str>) -> Result<Self> {
        let from = from_date.map(parse_date).transpose()?;
        let to = to_date.map(parse_date).transpose()?;
        Self::new(from, to)
    }

    /// Clip an interval to this horizon. Returns None when they do not overlap.
    pub fn clip(&self, from: NaiveDate, to: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = from.max(self.start);
        let end = to.min(self.end);
        (start <= end).then_some((start, end))
    }
}

/// Parse a date string in "YYYY-MM-DD" format.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| AlloError::InvalidValue {
        field: "date".into(),
        value: s.to_string(),
    })
}

/// Format a NaiveDate as "YYYY-MM-DD".
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_horizon_requires_both_or_neither() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(matches!(
            Horizon::new(Some(d), None),
            Err(AlloError::InvalidDateRange(_))
        ));
        assert!(matches!(
            Horizon::new(None, Some(d)),
            Err(AlloError::InvalidDateRange(_))
        ));
        let unbounded = Horizon::new(None, None).unwrap();
        assert!(!unbounded.bounded);
        assert_eq!(unbounded.start, NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());
    }

    #[test]
    fn test_horizon_clip() {
        let horizon = Horizon::parse(Some("2020-01-01"), Some("2020-12-31")).unwrap();
        let from = NaiveDate::from_ymd_opt(2019, 6, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        assert_eq!(horizon.clip(from, to), Some((horizon.start, to)));
        let late = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(horizon.clip(late, late), None);
    }

    #[test]
    fn test_format_and_parse() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let formatted = format_date(&date);
        assert_eq!(formatted, "2023-06-15");
        assert_eq!(parse_date(&formatted).unwrap(), date);
        assert!(parse_date("15/06/2023").is_err());
    }
}
