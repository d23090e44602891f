//! The grouped output of a computation.

use crate::params::Dataset;
use allo_core::date_range::format_date;
use allo_core::schema::key;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    /// Values of the group columns, in column order.
    pub group: Vec<String>,
    pub date: NaiveDate,
    /// One value per dataset; None where no input row had a value.
    pub values: Vec<Option<f64>>,
}

/// Rows keyed by the requested group columns plus the date, one value
/// column per requested dataset. Rows are ordered by group then date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTable {
    pub group_columns: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub rows: Vec<OutputRow>,
}

impl OutputTable {
    /// Sum `(group, date, dataset index, value)` entries into a table.
    pub fn from_entries<I>(group_columns: Vec<String>, datasets: Vec<Dataset>, entries: I) -> Self
    where
        I: IntoIterator<Item = (Vec<String>, NaiveDate, usize, f64)>,
    {
        let width = datasets.len();
        let mut grouped: BTreeMap<(Vec<String>, NaiveDate), Vec<Option<f64>>> = BTreeMap::new();
        for (group, date, index, value) in entries {
            let slot = &mut grouped
                .entry((group, date))
                .or_insert_with(|| vec![None; width])[index];
            *slot = Some(slot.unwrap_or(0.0) + value);
        }
        let rows = grouped
            .into_iter()
            .map(|((group, date), values)| OutputRow {
                group,
                date,
                values,
            })
            .collect();
        Self {
            group_columns,
            datasets,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header row: group columns, `date`, then dataset names.
    pub fn headers(&self) -> Vec<String> {
        self.group_columns
            .iter()
            .cloned()
            .chain(std::iter::once(key::DATE.to_string()))
            .chain(self.datasets.iter().map(|d| d.name().to_string()))
            .collect()
    }

    /// Rows rendered as text; a missing value renders as an empty cell.
    pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|row| {
            row.group
                .iter()
                .cloned()
                .chain(std::iter::once(format_date(&row.date)))
                .chain(
                    row.values
                        .iter()
                        .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
                )
                .collect()
        })
    }

    /// Value of `dataset` for one group and date.
    pub fn value(&self, group: &[&str], date: NaiveDate, dataset: Dataset) -> Option<f64> {
        let index = self.datasets.iter().position(|d| *d == dataset)?;
        self.rows
            .iter()
            .find(|row| row.date == date && row.group.iter().eq(group.iter().copied()))
            .and_then(|row| row.values[index])
    }

    /// Sum of a dataset column over all rows.
    pub fn total(&self, dataset: Dataset) -> f64 {
        let Some(index) = self.datasets.iter().position(|d| *d == dataset) else {
            return 0.0;
        };
        self.rows.iter().filter_map(|row| row.values[index]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn table() -> OutputTable {
        OutputTable::from_entries(
            vec!["wap".into()],
            vec![Dataset::Allocation, Dataset::Usage],
            vec![
                (vec!["BS28/5006".to_string()], d(1), 0, 60.0),
                (vec!["BS28/5006".to_string()], d(1), 0, 40.0),
                (vec!["BS28/5006".to_string()], d(1), 1, 90.0),
                (vec!["BS28/5006".to_string()], d(2), 0, 100.0),
            ],
        )
    }

    #[test]
    fn test_groups_and_sums() {
        let t = table();
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(&["BS28/5006"], d(1), Dataset::Allocation), Some(100.0));
        assert_eq!(t.value(&["BS28/5006"], d(1), Dataset::Usage), Some(90.0));
        assert_eq!(t.value(&["BS28/5006"], d(2), Dataset::Usage), None);
        assert_eq!(t.total(Dataset::Allocation), 200.0);
        assert_eq!(t.total(Dataset::MeteredAllocation), 0.0);
    }

    #[test]
    fn test_text_rendering() {
        let t = table();
        assert_eq!(t.headers(), vec!["wap", "date", "allocation", "usage"]);
        let records: Vec<Vec<String>> = t.records().collect();
        assert_eq!(records[0], vec!["BS28/5006", "2020-01-01", "100", "90"]);
        assert_eq!(records[1], vec!["BS28/5006", "2020-01-02", "100", ""]);
    }
}
