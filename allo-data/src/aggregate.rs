//! Calendar-aware grouping of dated values per entity.

use allo_core::frequency::Frequency;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Min,
}

/// Values grouped by entity and bucket start.
#[derive(Debug, Clone)]
pub struct Grouped<K> {
    groups: BTreeMap<(K, NaiveDate), Vec<f64>>,
}

/// Group `(entity, date, value)` rows into `frequency` buckets per entity.
///
/// Dates are relabelled with the start of their bucket, so fiscal years are
/// bucketed the same way everywhere an annual rollup happens.
pub fn aggregate<K, I>(rows: I, frequency: Frequency) -> Grouped<K>
where
    K: Ord,
    I: IntoIterator<Item = (K, NaiveDate, f64)>,
{
    let mut groups: BTreeMap<(K, NaiveDate), Vec<f64>> = BTreeMap::new();
    for (key, date, value) in rows {
        groups
            .entry((key, frequency.bucket_start(date)))
            .or_default()
            .push(value);
    }
    Grouped { groups }
}

impl<K: Ord + Clone> Grouped<K> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn reduce(&self, reducer: Reducer) -> BTreeMap<(K, NaiveDate), f64> {
        self.groups
            .iter()
            .map(|(key, values)| {
                let value = match reducer {
                    Reducer::Sum => values.iter().sum(),
                    Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
                    Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
                };
                (key.clone(), value)
            })
            .collect()
    }

    pub fn sum(&self) -> BTreeMap<(K, NaiveDate), f64> {
        self.reduce(Reducer::Sum)
    }

    pub fn mean(&self) -> BTreeMap<(K, NaiveDate), f64> {
        self.reduce(Reducer::Mean)
    }

    pub fn min(&self) -> BTreeMap<(K, NaiveDate), f64> {
        self.reduce(Reducer::Min)
    }
}
