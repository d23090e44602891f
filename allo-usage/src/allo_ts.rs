//! Standalone allocation series per consent block.

use crate::reader::{read_consents, read_links, ColumnFilters};
use allo_core::date_range::Horizon;
use allo_core::error::Result;
use allo_core::frequency::Frequency;
use allo_core::record::{BlockKey, RestrictionType};
use allo_core::source::SourceStore;
use allo_data::apportion::apportion_all;
use allo_data::filter::{filter, FilterOptions};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Allocation per eligible consent block over `horizon`.
///
/// Unlike [`AlloUsage`](crate::pipeline::AlloUsage) no site table is needed:
/// every point link takes part in filtering and blocks are not split among
/// their points. With `remove_months` set, buckets outside a block's active
/// months are dropped.
pub fn allo_ts<S: SourceStore>(
    store: &S,
    horizon: &Horizon,
    frequency: Frequency,
    restriction: RestrictionType,
    remove_months: bool,
    options: &FilterOptions,
) -> Result<BTreeMap<(BlockKey, NaiveDate), f64>> {
    let no_filters = ColumnFilters::new();
    let consents = read_consents(store, &no_filters)?;
    let links = read_links(store, &no_filters)?;
    let eligible = filter(consents, links, horizon, options)?;

    let series = apportion_all(
        &eligible.consents,
        |consent| consent.key.clone(),
        horizon,
        frequency,
        restriction,
        remove_months,
    )?;
    log::info!(
        "allo_ts: {} blocks, {} values at {}",
        eligible.consents.len(),
        series.len(),
        frequency
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use allo_core::error::AlloError;
    use allo_core::record::TakeType;
    use allo_db::Database;

    const CRC_ALLO: &str = "\
crc,take_type,allo_block,from_date,to_date,from_month,to_month,max_rate_crc,daily_vol,feav,crc_status,in_gw_allo
CRC001,Take Groundwater,A,2018-07-01,2025-06-30,1,12,5,60,21900,Issued - Active,1
CRC003,Take Groundwater,A,2018-07-01,2025-06-30,10,4,5,20,7300,Issued - Active,1
CRC009,Take Groundwater,A,2018-07-01,2025-06-30,1,12,5,20,7300,Application in Process,1
";

    const CRC_WAP_ALLO: &str = "\
crc,take_type,allo_block,wap,max_rate_wap,in_sw_allo
CRC001,Take Groundwater,A,BS28/5006,2,0
CRC001,Take Groundwater,A,BS28/5008,3,0
CRC003,Take Groundwater,A,BS28/5007,5,0
CRC009,Take Groundwater,A,BS28/5007,5,0
";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn block(crc: &str) -> BlockKey {
        BlockKey::new(crc, TakeType::Groundwater, "A")
    }

    fn store() -> Database {
        let db = Database::new().unwrap();
        db.load_table("crc_allo", CRC_ALLO).unwrap();
        db.load_table("crc_wap_allo", CRC_WAP_ALLO).unwrap();
        db
    }

    fn horizon() -> Horizon {
        Horizon::new(Some(d(2019, 1, 1)), Some(d(2019, 12, 31))).unwrap()
    }

    #[test]
    fn test_block_level_series() {
        let series = allo_ts(
            &store(),
            &horizon(),
            Frequency::Monthly,
            RestrictionType::AnnualVolume,
            true,
            &FilterOptions::default(),
        )
        .unwrap();
        // two points, one block value
        assert_eq!(series[&(block("CRC001"), d(2019, 1, 1))], 1860.0);
        assert!(!series.keys().any(|(k, _)| k.crc == "CRC009"));

        let months: Vec<NaiveDate> = series
            .keys()
            .filter(|(k, _)| k.crc == "CRC003")
            .map(|(_, date)| *date)
            .collect();
        assert_eq!(months.len(), 7);
        assert!(!months.contains(&d(2019, 6, 1)));
    }

    #[test]
    fn test_keep_inactive_months() {
        let series = allo_ts(
            &store(),
            &horizon(),
            Frequency::Daily,
            RestrictionType::DailyVolume,
            false,
            &FilterOptions::default(),
        )
        .unwrap();
        assert_eq!(series[&(block("CRC003"), d(2019, 6, 1))], 20.0);
        let crc001: f64 = series
            .iter()
            .filter(|((k, _), _)| k.crc == "CRC001")
            .map(|(_, v)| v)
            .sum();
        assert_eq!(crc001, 365.0 * 60.0);
    }

    #[test]
    fn test_restriction_must_suit_frequency() {
        let result = allo_ts(
            &store(),
            &horizon(),
            Frequency::Daily,
            RestrictionType::AnnualVolume,
            true,
            &FilterOptions::default(),
        );
        assert!(matches!(
            result,
            Err(AlloError::InvalidRestrictionType { .. })
        ));
    }
}
