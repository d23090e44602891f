//! JSON run configuration.
//!
//! Every field is optional in the file; missing fields take the library
//! defaults. Command line flags are applied on top afterwards.

use allo_core::frequency::Frequency;
use allo_data::filter::FilterOptions;
use allo_usage::{Dataset, MeteredMode, Request, Selection, DEFAULT_USAGE_DATASET_TYPES};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub filter: FilterOptions,
    pub selection: Selection,
    pub datasets: Vec<Dataset>,
    pub group_by: Vec<String>,
    pub sd_days: u32,
    pub irrigation_season: bool,
    pub usage_allocation_ratio: f64,
    pub metered_mode: MeteredMode,
    pub usage_dataset_types: Vec<i64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let request = Request::default();
        Self {
            filter: FilterOptions::default(),
            selection: Selection::default(),
            datasets: request.datasets,
            group_by: request.group_by,
            sd_days: request.sd_days,
            irrigation_season: request.irrigation_season,
            usage_allocation_ratio: request.usage_allocation_ratio,
            metered_mode: request.metered_mode,
            usage_dataset_types: DEFAULT_USAGE_DATASET_TYPES.to_vec(),
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded run config from {}", path.display());
        Ok(config)
    }

    pub fn request(&self, frequency: Frequency) -> Request {
        Request::new(&self.datasets, frequency)
            .group_by(self.group_by.iter().cloned())
            .sd_days(self.sd_days)
            .irrigation_season(self.irrigation_season)
            .usage_allocation_ratio(self.usage_allocation_ratio)
            .metered_mode(self.metered_mode)
    }
}
