//! The `allo-ts` and `usage-ts` commands.

use crate::config::RunConfig;
use crate::output::{open_output, write_block_series, write_table};
use allo_core::date_range::Horizon;
use allo_core::frequency::Frequency;
use allo_core::record::{BlockKey, RestrictionType};
use allo_db::Database;
use allo_usage::{allo_ts, AlloUsage, Dataset, OutputTable};
use chrono::NaiveDate;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct AlloTsArgs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub freq: String,
    pub restriction: String,
    pub keep_inactive_months: bool,
    pub include_non_allocated: bool,
}

/// Command line values for `usage-ts`; set values override the config.
#[derive(Debug, Clone, Default)]
pub struct UsageTsArgs {
    pub from: Option<String>,
    pub to: Option<String>,
    pub freq: String,
    pub datasets: Option<String>,
    pub group_by: Option<String>,
    pub sd_days: Option<u32>,
    pub irrigation_season: bool,
    pub usage_ratio: Option<f64>,
    pub metered_mode: Option<String>,
}

impl UsageTsArgs {
    pub fn apply(&self, config: &mut RunConfig) -> anyhow::Result<()> {
        if let Some(datasets) = &self.datasets {
            config.datasets = Dataset::parse_list(datasets)?;
        }
        if let Some(group_by) = &self.group_by {
            config.group_by = group_by
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(sd_days) = self.sd_days {
            config.sd_days = sd_days;
        }
        if self.irrigation_season {
            config.irrigation_season = true;
        }
        if let Some(ratio) = self.usage_ratio {
            config.usage_allocation_ratio = ratio;
        }
        if let Some(mode) = &self.metered_mode {
            config.metered_mode = mode.parse()?;
        }
        Ok(())
    }
}

fn open_store(data_dir: &Path) -> anyhow::Result<Database> {
    let db = Database::new()?;
    let rows = db.load_dir(data_dir)?;
    info!("Loaded {} rows from {}", rows, data_dir.display());
    Ok(db)
}

pub fn allo_ts_series(
    data_dir: &Path,
    config: &RunConfig,
    args: &AlloTsArgs,
) -> anyhow::Result<BTreeMap<(BlockKey, NaiveDate), f64>> {
    let horizon = Horizon::parse(args.from.as_deref(), args.to.as_deref())?;
    let frequency: Frequency = args.freq.parse()?;
    let restriction: RestrictionType = args.restriction.parse()?;
    let mut filter = config.filter.clone();
    if args.include_non_allocated {
        filter.in_allocation_only = false;
    }

    let store = open_store(data_dir)?;
    let series = allo_ts(
        &store,
        &horizon,
        frequency,
        restriction,
        !args.keep_inactive_months,
        &filter,
    )?;
    Ok(series)
}

pub fn usage_table(
    data_dir: &Path,
    config: &RunConfig,
    args: &UsageTsArgs,
) -> anyhow::Result<OutputTable> {
    let horizon = Horizon::parse(args.from.as_deref(), args.to.as_deref())?;
    let frequency: Frequency = args.freq.parse()?;
    let mut config = config.clone();
    args.apply(&mut config)?;

    let store = open_store(data_dir)?;
    let mut pipeline = AlloUsage::new(store, horizon, &config.selection, &config.filter)?
        .with_usage_dataset_types(config.usage_dataset_types.clone());
    let table = pipeline.compute(&config.request(frequency))?;
    Ok(table)
}

pub fn run_allo_ts(
    data_dir: &Path,
    config_path: Option<&Path>,
    args: &AlloTsArgs,
    output: &str,
) -> anyhow::Result<()> {
    let config = RunConfig::load(config_path)?;
    let series = allo_ts_series(data_dir, &config, args)?;
    let rows = write_block_series(&series, open_output(output)?)?;
    info!("Wrote {} rows to {}", rows, output);
    Ok(())
}

pub fn run_usage_ts(
    data_dir: &Path,
    config_path: Option<&Path>,
    args: &UsageTsArgs,
    output: &str,
) -> anyhow::Result<()> {
    let config = RunConfig::load(config_path)?;
    let table = usage_table(data_dir, &config, args)?;
    let rows = write_table(&table, open_output(output)?)?;
    info!("Wrote {} rows to {}", rows, output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allo_core::record::TakeType;
    use allo_usage::MeteredMode;
    use std::path::PathBuf;

    const SITES: &str = "\
ext_site_id,swaz
BS28/5006,Selwyn
BS28/5007,Rakaia
";

    const CRC_ALLO: &str = "\
crc,take_type,allo_block,from_date,to_date,from_month,to_month,daily_vol,feav,crc_status,in_gw_allo
CRC001,Take Groundwater,A,2018-07-01,2025-06-30,1,12,60,21900,Issued - Active,1
CRC002,Take Groundwater,A,2018-07-01,2025-06-30,1,12,40,14600,Issued - Active,1
CRC003,Take Groundwater,A,2018-07-01,2025-06-30,1,12,10,3650,Issued - Active,0
";

    const CRC_WAP_ALLO: &str = "\
crc,take_type,allo_block,wap,max_rate_wap,in_sw_allo
CRC001,Take Groundwater,A,BS28/5006,5,0
CRC002,Take Groundwater,A,BS28/5006,5,0
CRC003,Take Groundwater,A,BS28/5007,5,0
";

    const TS_SUMMARY: &str = "\
ext_site_id,dataset_type_id,from_date,to_date
BS28/5006,12,2010-01-01,2020-01-01
";

    const TS_DATA: &str = "\
ext_site_id,dataset_type_id,date_time,value
BS28/5006,12,2019-03-01,50
BS28/5006,12,2019-03-02,50
";

    fn data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("allo-cmd-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("sites.csv"), SITES).unwrap();
        std::fs::write(dir.join("crc_allo.csv"), CRC_ALLO).unwrap();
        std::fs::write(dir.join("crc_wap_allo.csv"), CRC_WAP_ALLO).unwrap();
        std::fs::write(dir.join("ts_summary.csv"), TS_SUMMARY).unwrap();
        std::fs::write(dir.join("ts_data.csv"), TS_DATA).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_args_override_config() {
        let mut config = RunConfig::default();
        let args = UsageTsArgs {
            datasets: Some("allocation,usage".into()),
            group_by: Some("crc, date".into()),
            sd_days: Some(7),
            metered_mode: Some("any-point-present".into()),
            ..Default::default()
        };
        args.apply(&mut config).unwrap();
        assert_eq!(config.datasets, vec![Dataset::Allocation, Dataset::Usage]);
        assert_eq!(config.group_by, vec!["crc", "date"]);
        assert_eq!(config.sd_days, 7);
        assert_eq!(config.metered_mode, MeteredMode::AnyPointPresent);
        assert!(!config.irrigation_season);

        let bad = UsageTsArgs {
            datasets: Some("allocation,rainfall".into()),
            ..Default::default()
        };
        assert!(bad.apply(&mut config).is_err());
    }

    #[test]
    fn test_usage_table_from_directory() {
        let dir = data_dir("usage");
        let args = UsageTsArgs {
            from: Some("2019-01-01".into()),
            to: Some("2019-12-31".into()),
            freq: "M".into(),
            datasets: Some("allocation,usage".into()),
            group_by: Some("wap".into()),
            ..Default::default()
        };
        let table = usage_table(&dir, &RunConfig::default(), &args).unwrap();
        // CRC003 is not counted in the allocation
        assert_eq!(table.value(&["BS28/5007"], d(2019, 1, 1), Dataset::Allocation), None);
        assert_eq!(
            table.value(&["BS28/5006"], d(2019, 1, 1), Dataset::Allocation),
            Some(3100.0)
        );
        assert_eq!(table.value(&["BS28/5006"], d(2019, 3, 1), Dataset::Usage), Some(100.0));
        assert_eq!(table.value(&["BS28/5006"], d(2019, 4, 1), Dataset::Usage), None);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_allo_ts_writes_csv() {
        let dir = data_dir("allo-ts");
        let args = AlloTsArgs {
            from: Some("2019-01-01".into()),
            to: Some("2019-12-31".into()),
            freq: "A-JUN".into(),
            restriction: "annual volume".into(),
            include_non_allocated: true,
            ..Default::default()
        };
        let series = allo_ts_series(&dir, &RunConfig::default(), &args).unwrap();
        let crc003 = BlockKey::new("CRC003", TakeType::Groundwater, "A");
        assert!(series.contains_key(&(crc003, d(2018, 7, 1))));

        let output = dir.join("allo.csv");
        let output = output.to_str().unwrap();
        run_allo_ts(&dir, None, &args, output).unwrap();
        let text = std::fs::read_to_string(output).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("crc,take_type,allo_block,date,allocation")
        );
        assert_eq!(text.lines().count(), series.len() + 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bad_frequency() {
        let dir = data_dir("bad-freq");
        let args = UsageTsArgs {
            freq: "fortnightly".into(),
            ..Default::default()
        };
        assert!(usage_table(&dir, &RunConfig::default(), &args).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
