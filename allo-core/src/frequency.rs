//! Time series frequencies and the calendar buckets they produce.
//!
//! Every bucket is labelled by its start date. Weeks start on Monday, months
//! on the first, and fiscal years on the first day of a configurable month
//! (`A-JUN` is the year ending June, i.e. starting July 1).

use crate::error::{AlloError, Result};
use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Months of the irrigation season: October through April.
pub const IRRIGATION_SEASON: ActiveMonths = ActiveMonths { from: 10, to: 4 };

/// The discretisation frequency of a time series.
///
/// Serialises as its code, e.g. `"A-JUN"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// Fiscal year starting on the first day of `start_month`.
    Annual { start_month: u32 },
}

impl Frequency {
    /// The July-June fiscal year.
    pub const ANNUAL_JUNE: Frequency = Frequency::Annual { start_month: 7 };

    pub fn is_annual(&self) -> bool {
        matches!(self, Frequency::Annual { .. })
    }

    /// The pandas-style code for this frequency (`D`, `W`, `M`, `A-JUN`, ...).
    pub fn code(&self) -> String {
        match self {
            Frequency::Daily => "D".to_string(),
            Frequency::Weekly => "W".to_string(),
            Frequency::Monthly => "M".to_string(),
            Frequency::Annual { start_month } => {
                // the code names the month the year ends in
                let end_month = (start_month + 10) % 12;
                format!("A-{}", MONTH_ABBREVIATIONS[end_month as usize])
            }
        }
    }

    /// Start of the bucket containing `date`.
    pub fn bucket_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                date - TimeDelta::days(date.weekday().num_days_from_monday() as i64)
            }
            Frequency::Monthly => first_of_month(date),
            Frequency::Annual { start_month } => {
                let back = (date.month() + 12 - start_month) % 12;
                first_of_month(date) - Months::new(back)
            }
        }
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next_bucket_start(&self, start: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => start + TimeDelta::days(1),
            Frequency::Weekly => start + TimeDelta::days(7),
            Frequency::Monthly => start + Months::new(1),
            Frequency::Annual { .. } => start + Months::new(12),
        }
    }

    /// The bucket containing `date`.
    pub fn bucket(&self, date: NaiveDate) -> Bucket {
        let start = self.bucket_start(date);
        let end = self.next_bucket_start(start) - TimeDelta::days(1);
        Bucket { start, end }
    }

    /// All buckets touching the inclusive interval `[from, to]`, in order.
    /// The first and last buckets may extend past the interval.
    pub fn buckets(&self, from: NaiveDate, to: NaiveDate) -> Buckets {
        Buckets {
            frequency: *self,
            next: self.bucket_start(from),
            last: to,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Frequency {
    type Err = AlloError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_ascii_uppercase();
        match code.as_str() {
            "D" => Ok(Frequency::Daily),
            "W" => Ok(Frequency::Weekly),
            "M" => Ok(Frequency::Monthly),
            "A" => Ok(Frequency::Annual { start_month: 1 }),
            _ => {
                let end = code
                    .strip_prefix("A-")
                    .and_then(|m| MONTH_ABBREVIATIONS.iter().position(|abbr| *abbr == m))
                    .ok_or_else(|| AlloError::InvalidFrequency(s.to_string()))?;
                Ok(Frequency::Annual {
                    start_month: (end as u32 + 1) % 12 + 1,
                })
            }
        }
    }
}

impl TryFrom<String> for Frequency {
    type Error = AlloError;

    fn try_from(code: String) -> Result<Self> {
        code.parse()
    }
}

impl From<Frequency> for String {
    fn from(frequency: Frequency) -> Self {
        frequency.code()
    }
}

/// One discretised period, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Bucket {
    /// Number of days in the bucket.
    pub fn nominal_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Days of this bucket that fall inside `[from, to]`.
    ///
    /// Computed as the nominal length minus the head overhang (days before
    /// `from`) and the tail overhang (days after `to`), each clamped at zero.
    pub fn effective_days(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let head = (from - self.start).num_days().max(0);
        let tail = (self.end - to).num_days().max(0);
        (self.nominal_days() - head - tail).max(0)
    }
}

/// Iterator over consecutive buckets of one frequency.
#[derive(Debug, Clone)]
pub struct Buckets {
    frequency: Frequency,
    next: NaiveDate,
    last: NaiveDate,
}

impl Iterator for Buckets {
    type Item = Bucket;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.last {
            return None;
        }
        let bucket = self.frequency.bucket(self.next);
        self.next = self.frequency.next_bucket_start(bucket.start);
        Some(bucket)
    }
}

/// A seasonal month window, inclusive, which may wrap over the year end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveMonths {
    pub from: u32,
    pub to: u32,
}

impl ActiveMonths {
    pub fn contains(&self, month: u32) -> bool {
        if self.from > self.to {
            month >= self.from || month <= self.to
        } else {
            (self.from..=self.to).contains(&month)
        }
    }
}

/// Number of days in the calendar month containing `date`.
pub fn days_in_month(date: NaiveDate) -> i64 {
    let first = first_of_month(date);
    (first + Months::new(1) - first).num_days()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - TimeDelta::days(date.day0() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert_eq!("w".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!("M".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("A-JUN".parse::<Frequency>().unwrap(), Frequency::ANNUAL_JUNE);
        assert_eq!(
            "A".parse::<Frequency>().unwrap(),
            Frequency::Annual { start_month: 1 }
        );
        assert_eq!(
            "A-SEP".parse::<Frequency>().unwrap(),
            Frequency::Annual { start_month: 10 }
        );
        assert!(matches!(
            "Q".parse::<Frequency>(),
            Err(AlloError::InvalidFrequency(_))
        ));
        assert!("A-XYZ".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_code_round_trips_through_display() {
        assert_eq!(Frequency::ANNUAL_JUNE.to_string(), "A-JUN");
        assert_eq!(Frequency::Annual { start_month: 1 }.code(), "A-DEC");
        assert_eq!(Frequency::Monthly.code(), "M");
    }

    #[test]
    fn test_bucket_start() {
        // 2020-01-01 is a Wednesday
        assert_eq!(Frequency::Weekly.bucket_start(d(2020, 1, 1)), d(2019, 12, 30));
        assert_eq!(Frequency::Monthly.bucket_start(d(2020, 2, 29)), d(2020, 2, 1));
        assert_eq!(
            Frequency::ANNUAL_JUNE.bucket_start(d(2020, 6, 30)),
            d(2019, 7, 1)
        );
        assert_eq!(
            Frequency::ANNUAL_JUNE.bucket_start(d(2020, 7, 1)),
            d(2020, 7, 1)
        );
        assert_eq!(
            Frequency::Annual { start_month: 1 }.bucket_start(d(2020, 12, 31)),
            d(2020, 1, 1)
        );
    }

    #[test]
    fn test_buckets_cover_interval() {
        let buckets: Vec<Bucket> = Frequency::Monthly
            .buckets(d(2020, 1, 15), d(2020, 3, 10))
            .collect();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].start, d(2020, 1, 1));
        assert_eq!(buckets[1].nominal_days(), 29);
        assert_eq!(buckets[2].end, d(2020, 3, 31));
    }

    #[test]
    fn test_effective_days_single_bucket() {
        let bucket = Frequency::Monthly.bucket(d(2021, 4, 1));
        assert_eq!(bucket.effective_days(d(2021, 4, 1), d(2021, 4, 30)), 30);
        // both overhangs at once
        assert_eq!(bucket.effective_days(d(2021, 4, 11), d(2021, 4, 20)), 10);
    }

    #[test]
    fn test_active_months_wraparound() {
        let season = ActiveMonths { from: 10, to: 4 };
        for month in [10, 11, 12, 1, 2, 3, 4] {
            assert!(season.contains(month));
        }
        for month in 5..=9 {
            assert!(!season.contains(month));
        }
        let summer = ActiveMonths { from: 3, to: 5 };
        assert!(summer.contains(4));
        assert!(!summer.contains(12));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(d(2019, 2, 10)), 28);
        assert_eq!(days_in_month(d(2020, 2, 10)), 29);
        assert_eq!(days_in_month(d(2020, 12, 31)), 31);
    }
}
