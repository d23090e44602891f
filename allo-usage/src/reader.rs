//! Reads of the source tables the pipeline needs.
//!
//! Rows that cannot be converted are logged and skipped; data-quality gaps
//! never fail a read.

use allo_core::date_range::Horizon;
use allo_core::error::{AlloError, Result};
use allo_core::frequency::Frequency;
use allo_core::record::{ConsentRecord, PointLink, Site};
use allo_core::schema::{crc_allo, crc_wap_allo, lowflow, sites, ts_data, ts_summary};
use allo_core::source::{Row, SourceQuery, SourceStore, Value};
use allo_data::aggregate::aggregate;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Equality filters per column, as passed to [`SourceQuery::with_filters`].
pub type ColumnFilters = BTreeMap<String, Vec<String>>;

fn convert<T>(rows: &[Row], what: &str) -> Vec<T>
where
    T: for<'a> TryFrom<&'a Row, Error = AlloError>,
{
    let mut skipped = 0usize;
    let records: Vec<T> = rows
        .iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping {} row: {}", what, e);
                skipped += 1;
                None
            }
        })
        .collect();
    if skipped > 0 {
        log::warn!("skipped {} of {} {} rows", skipped, rows.len(), what);
    }
    records
}

pub fn read_sites<S: SourceStore>(store: &S, filters: &ColumnFilters) -> Result<Vec<Site>> {
    let rows = store.read(&SourceQuery::table(sites::TABLE).with_filters(filters))?;
    Ok(convert(&rows, "site"))
}

pub fn read_consents<S: SourceStore>(
    store: &S,
    filters: &ColumnFilters,
) -> Result<Vec<ConsentRecord>> {
    let rows = store.read(&SourceQuery::table(crc_allo::TABLE).with_filters(filters))?;
    Ok(convert(&rows, "consent"))
}

pub fn read_links<S: SourceStore>(store: &S, filters: &ColumnFilters) -> Result<Vec<PointLink>> {
    let rows = store.read(&SourceQuery::table(crc_wap_allo::TABLE).with_filters(filters))?;
    Ok(convert(&rows, "point link"))
}

fn dataset_values(dataset_types: &[i64]) -> Vec<Value> {
    dataset_types.iter().map(|id| Value::Integer(*id)).collect()
}

/// Sites among `waps` with a usage series of one of `dataset_types`
/// overlapping the horizon.
pub fn read_usage_sites<S: SourceStore>(
    store: &S,
    waps: &BTreeSet<String>,
    dataset_types: &[i64],
    horizon: &Horizon,
) -> Result<BTreeSet<String>> {
    if waps.is_empty() || dataset_types.is_empty() {
        return Ok(BTreeSet::new());
    }
    let query = SourceQuery::table(ts_summary::TABLE)
        .columns([
            ts_summary::SITE_ID,
            ts_summary::FROM_DATE,
            ts_summary::TO_DATE,
        ])
        .filter(ts_summary::SITE_ID, waps.iter().map(String::as_str))
        .filter(ts_summary::DATASET_TYPE_ID, dataset_values(dataset_types));
    let rows = store.read(&query)?;

    let sites: BTreeSet<String> = rows
        .iter()
        .filter(|row| {
            match (row.opt_date(ts_summary::FROM_DATE), row.opt_date(ts_summary::TO_DATE)) {
                (Some(from), Some(to)) => from < horizon.end && to > horizon.start,
                _ => false,
            }
        })
        .filter_map(|row| row.opt_text(ts_summary::SITE_ID).ok().flatten())
        .collect();
    log::debug!("{} of {} points carry usage", sites.len(), waps.len());
    Ok(sites)
}

/// Raw daily usage per site over the horizon, summed across dataset types.
pub fn read_daily_usage<S: SourceStore>(
    store: &S,
    waps: &BTreeSet<String>,
    dataset_types: &[i64],
    horizon: &Horizon,
) -> Result<BTreeMap<(String, NaiveDate), f64>> {
    if waps.is_empty() || dataset_types.is_empty() {
        return Ok(BTreeMap::new());
    }
    let query = SourceQuery::table(ts_data::TABLE)
        .columns([ts_data::SITE_ID, ts_data::DATE, ts_data::VALUE])
        .filter(ts_data::SITE_ID, waps.iter().map(String::as_str))
        .filter(ts_data::DATASET_TYPE_ID, dataset_values(dataset_types))
        .date_range(ts_data::DATE, Some(horizon.start), Some(horizon.end));
    let rows = store.read(&query)?;

    let mut usage = BTreeMap::new();
    for row in &rows {
        let (Ok(Some(site)), Some(date), Ok(Some(value))) = (
            row.opt_text(ts_data::SITE_ID),
            row.opt_date(ts_data::DATE),
            row.opt_f64(ts_data::VALUE),
        ) else {
            continue;
        };
        *usage.entry((site, date)).or_insert(0.0) += value;
    }
    Ok(usage)
}

/// Daily restriction ratio per consent: the minimum low flow percentage
/// across the consent's blocks, as a fraction.
pub fn read_daily_restrictions<S: SourceStore>(
    store: &S,
    crcs: &BTreeSet<String>,
    horizon: &Horizon,
) -> Result<BTreeMap<(String, NaiveDate), f64>> {
    if crcs.is_empty() {
        return Ok(BTreeMap::new());
    }
    let query = SourceQuery::table(lowflow::TABLE)
        .columns([lowflow::CRC, lowflow::DATE, lowflow::ALLOCATION])
        .filter(lowflow::CRC, crcs.iter().map(String::as_str))
        .date_range(lowflow::DATE, Some(horizon.start), Some(horizon.end));
    let rows = store.read(&query)?;

    let readings = rows.iter().filter_map(|row| {
        let crc = row.opt_text(lowflow::CRC).ok().flatten()?;
        let date = row.opt_date(lowflow::DATE)?;
        let percent = row.opt_f64(lowflow::ALLOCATION).ok().flatten()?;
        Some((crc, date, percent))
    });
    let ratios = aggregate(readings, Frequency::Daily)
        .min()
        .into_iter()
        .map(|(key, percent)| (key, percent * 0.01))
        .collect();
    Ok(ratios)
}
