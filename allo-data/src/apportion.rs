//! Temporal apportionment: one allocation record over a horizon becomes an
//! ordered series of bucket values at a chosen frequency.

use allo_core::date_range::Horizon;
use allo_core::error::Result;
use allo_core::frequency::{days_in_month, Frequency};
use allo_core::record::{Allocation, AllocationRecord, PointKey, RestrictionType};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Bucket values per point record, ordered by key then bucket start.
pub type ApportionedSeries = BTreeMap<(PointKey, NaiveDate), f64>;

/// Days in the year used to spread an annual volume over calendar months.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Apportion one record to `(bucket_start, value)` pairs.
///
/// The record's validity window is clipped to the horizon. Each bucket value
/// is the source magnitude scaled by the fraction of the bucket inside the
/// clipped window, rounded half to even. For monthly buckets the magnitude is
/// an annual volume spread by `days_in_month / 365`. With `seasonal` set,
/// sub-annual buckets whose month is outside the record's active months are
/// dropped.
///
/// A record without the requested magnitude, or whose window misses the
/// horizon, yields an empty series.
pub fn apportion<A: Allocation + ?Sized>(
    record: &A,
    horizon: &Horizon,
    frequency: Frequency,
    restriction: RestrictionType,
    seasonal: bool,
) -> Result<Vec<(NaiveDate, f64)>> {
    let magnitude = restriction.magnitude(record, frequency)?;
    let (Some(magnitude), Some((from, to))) = (magnitude, record.validity()) else {
        return Ok(Vec::new());
    };
    let Some((start, end)) = horizon.clip(from, to) else {
        return Ok(Vec::new());
    };
    let months = record.months();

    let values = frequency
        .buckets(start, end)
        .filter(|bucket| !seasonal || frequency.is_annual() || months.contains(bucket.start.month()))
        .map(|bucket| {
            let source = match frequency {
                Frequency::Monthly => days_in_month(bucket.start) as f64 / DAYS_PER_YEAR * magnitude,
                _ => magnitude,
            };
            let ratio = bucket.effective_days(start, end) as f64 / bucket.nominal_days() as f64;
            (bucket.start, (ratio * source).round_ties_even())
        })
        .collect();
    Ok(values)
}

/// Apportion every record in parallel and merge the results under `key_of`.
///
/// Values landing on the same key and bucket are summed.
pub fn apportion_all<A, K, F>(
    records: &[A],
    key_of: F,
    horizon: &Horizon,
    frequency: Frequency,
    restriction: RestrictionType,
    seasonal: bool,
) -> Result<BTreeMap<(K, NaiveDate), f64>>
where
    A: Allocation + Sync,
    K: Ord + Clone + Send,
    F: Fn(&A) -> K + Sync,
{
    let per_record = records
        .par_iter()
        .map(|record| {
            apportion(record, horizon, frequency, restriction, seasonal)
                .map(|values| (key_of(record), values))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut series = BTreeMap::new();
    for (key, values) in per_record {
        for (date, value) in values {
            *series.entry((key.clone(), date)).or_insert(0.0) += value;
        }
    }
    log::debug!(
        "apportioned {} records at {} into {} values",
        records.len(),
        frequency,
        series.len()
    );
    Ok(series)
}

/// Apportion point records keyed by their point key.
pub fn apportion_points(
    records: &[AllocationRecord],
    horizon: &Horizon,
    frequency: Frequency,
    restriction: RestrictionType,
    seasonal: bool,
) -> Result<ApportionedSeries> {
    apportion_all(
        records,
        |record| record.key.clone(),
        horizon,
        frequency,
        restriction,
        seasonal,
    )
}
