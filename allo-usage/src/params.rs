//! Dataset names and the parameters a computation is run with.

use allo_core::error::{AlloError, Result};
use allo_core::frequency::Frequency;
use allo_core::schema::key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stream depletion day settings the groundwater data is published for.
pub const STREAM_DEPLETION_DAYS: [u32; 3] = [7, 30, 150];

/// Usage above this multiple of allocation is treated as an outlier.
pub const DEFAULT_USAGE_ALLOCATION_RATIO: f64 = 2.0;

/// A derived series a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Allocation,
    MeteredAllocation,
    RestrictedAllocation,
    MeteredRestrictedAllocation,
    Usage,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Allocation,
        Dataset::MeteredAllocation,
        Dataset::RestrictedAllocation,
        Dataset::MeteredRestrictedAllocation,
        Dataset::Usage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Allocation => "allocation",
            Dataset::MeteredAllocation => "metered_allocation",
            Dataset::RestrictedAllocation => "restricted_allocation",
            Dataset::MeteredRestrictedAllocation => "metered_restricted_allocation",
            Dataset::Usage => "usage",
        }
    }

    /// Parse a comma separated list of dataset names.
    pub fn parse_list(s: &str) -> Result<Vec<Dataset>> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dataset {
    type Err = AlloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "allocation" | "allo" => Ok(Dataset::Allocation),
            "metered_allocation" | "metered_allo" => Ok(Dataset::MeteredAllocation),
            "restricted_allocation" | "restr_allo" => Ok(Dataset::RestrictedAllocation),
            "metered_restricted_allocation" | "metered_restr_allo" => {
                Ok(Dataset::MeteredRestrictedAllocation)
            }
            "usage" => Ok(Dataset::Usage),
            _ => Err(AlloError::InvalidDatasetName(s.to_string())),
        }
    }
}

/// How metered allocation treats points without usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeteredMode {
    /// Zero a row whenever its own point has no usage.
    #[default]
    Proportional,
    /// Zero a row only when no point of the same block has usage.
    AnyPointPresent,
}

impl FromStr for MeteredMode {
    type Err = AlloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "proportional" => Ok(MeteredMode::Proportional),
            "any_point_present" => Ok(MeteredMode::AnyPointPresent),
            _ => Err(AlloError::InvalidValue {
                field: "metered_mode".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// One `compute` call: which datasets, at what frequency, grouped how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    pub datasets: Vec<Dataset>,
    pub frequency: Frequency,
    /// Output grouping columns; the date is always added.
    pub group_by: Vec<String>,
    pub sd_days: u32,
    pub irrigation_season: bool,
    pub usage_allocation_ratio: f64,
    pub metered_mode: MeteredMode,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            datasets: vec![Dataset::Allocation],
            frequency: Frequency::Monthly,
            group_by: vec![
                key::CRC.to_string(),
                key::TAKE_TYPE.to_string(),
                key::ALLO_BLOCK.to_string(),
                key::WAP.to_string(),
            ],
            sd_days: 150,
            irrigation_season: false,
            usage_allocation_ratio: DEFAULT_USAGE_ALLOCATION_RATIO,
            metered_mode: MeteredMode::Proportional,
        }
    }
}

impl Request {
    pub fn new(datasets: &[Dataset], frequency: Frequency) -> Self {
        Self {
            datasets: datasets.to_vec(),
            frequency,
            ..Default::default()
        }
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn irrigation_season(mut self, on: bool) -> Self {
        self.irrigation_season = on;
        self
    }

    pub fn sd_days(mut self, days: u32) -> Self {
        self.sd_days = days;
        self
    }

    pub fn usage_allocation_ratio(mut self, ratio: f64) -> Self {
        self.usage_allocation_ratio = ratio;
        self
    }

    pub fn metered_mode(mut self, mode: MeteredMode) -> Self {
        self.metered_mode = mode;
        self
    }

    /// The parameters the derived series are computed with. Annual requests
    /// compute monthly and roll up afterwards.
    pub fn parameters(&self) -> Result<Parameters> {
        if !STREAM_DEPLETION_DAYS.contains(&self.sd_days) {
            return Err(AlloError::InvalidStreamDepletionDays(self.sd_days));
        }
        if self.usage_allocation_ratio.is_nan() || self.usage_allocation_ratio <= 0.0 {
            return Err(AlloError::InvalidValue {
                field: "usage_allocation_ratio".into(),
                value: self.usage_allocation_ratio.to_string(),
            });
        }
        let frequency = if self.frequency.is_annual() {
            Frequency::Monthly
        } else {
            self.frequency
        };
        Ok(Parameters {
            frequency,
            sd_days: self.sd_days,
            irrigation_season: self.irrigation_season,
            usage_allocation_ratio: self.usage_allocation_ratio,
            metered_mode: self.metered_mode,
        })
    }
}

/// Everything the derived series depend on besides the input records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub frequency: Frequency,
    pub sd_days: u32,
    pub irrigation_season: bool,
    pub usage_allocation_ratio: f64,
    pub metered_mode: MeteredMode,
}
