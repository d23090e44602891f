//! Consent, extraction point and site records as read from the source store.

use crate::error::{AlloError, Result};
use crate::frequency::{ActiveMonths, Frequency};
use crate::schema::{crc_allo, crc_wap_allo, sites};
use crate::source::Row;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Surface water or groundwater abstraction category.
///
/// Any other take type (diversions, discharges, ...) is carried as `Other`
/// and never survives record filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TakeType {
    SurfaceWater,
    Groundwater,
    Other(String),
}

impl TakeType {
    pub fn is_take(&self) -> bool {
        !matches!(self, TakeType::Other(_))
    }
}

impl fmt::Display for TakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TakeType::SurfaceWater => write!(f, "Take Surface Water"),
            TakeType::Groundwater => write!(f, "Take Groundwater"),
            TakeType::Other(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for TakeType {
    type Err = AlloError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim() {
            "Take Surface Water" | "SW" => TakeType::SurfaceWater,
            "Take Groundwater" | "GW" => TakeType::Groundwater,
            other => TakeType::Other(other.to_string()),
        })
    }
}

/// Identifies one allocation block of a consent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub crc: String,
    pub take_type: TakeType,
    pub allo_block: String,
}

impl BlockKey {
    pub fn new(crc: &str, take_type: TakeType, allo_block: &str) -> Self {
        Self {
            crc: crc.to_string(),
            take_type,
            allo_block: allo_block.to_string(),
        }
    }

    pub fn at(&self, wap: &str) -> PointKey {
        PointKey {
            block: self.clone(),
            wap: wap.to_string(),
        }
    }
}

/// An allocation block at one extraction point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey {
    pub block: BlockKey,
    pub wap: String,
}

impl PointKey {
    /// Value of a primary key column, by output column name.
    pub fn column(&self, name: &str) -> Option<String> {
        use crate::schema::key;
        match name {
            key::CRC => Some(self.block.crc.clone()),
            key::TAKE_TYPE => Some(self.block.take_type.to_string()),
            key::ALLO_BLOCK => Some(self.block.allo_block.clone()),
            key::WAP => Some(self.wap.clone()),
            _ => None,
        }
    }
}

fn block_key(row: &Row, crc: &str, take_type: &str, allo_block: &str) -> Result<BlockKey> {
    Ok(BlockKey {
        crc: row.text(crc)?,
        take_type: row.text(take_type)?.parse()?,
        allo_block: row.text(allo_block)?,
    })
}

/// One consent allocation block as stored in the consent table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub key: BlockKey,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub from_month: u32,
    pub to_month: u32,
    pub max_rate: Option<f64>,
    pub daily_vol: Option<f64>,
    pub feav: Option<f64>,
    pub status: String,
    pub in_gw_allo: bool,
    pub use_type: Option<String>,
    /// Every non-key column rendered as text, for group-by metadata.
    pub attributes: BTreeMap<String, String>,
}

impl TryFrom<&Row> for ConsentRecord {
    type Error = AlloError;

    fn try_from(row: &Row) -> Result<Self> {
        let key = block_key(row, crc_allo::CRC, crc_allo::TAKE_TYPE, crc_allo::ALLO_BLOCK)?;
        let month = |column: &str, default: u32| -> Result<u32> {
            match row.opt_i64(column)? {
                None => Ok(default),
                Some(m) if (1..=12).contains(&m) => Ok(m as u32),
                Some(m) => Err(AlloError::InvalidValue {
                    field: column.to_string(),
                    value: m.to_string(),
                }),
            }
        };
        Ok(ConsentRecord {
            from_date: row.opt_date(crc_allo::FROM_DATE),
            to_date: row.opt_date(crc_allo::TO_DATE),
            from_month: month(crc_allo::FROM_MONTH, 1)?,
            to_month: month(crc_allo::TO_MONTH, 12)?,
            max_rate: row.opt_f64(crc_allo::MAX_RATE)?,
            daily_vol: row.opt_f64(crc_allo::DAILY_VOL)?,
            feav: row.opt_f64(crc_allo::FEAV)?,
            status: row.opt_text(crc_allo::STATUS)?.unwrap_or_default(),
            in_gw_allo: row.opt_bool(crc_allo::IN_GW_ALLO)?.unwrap_or(false),
            use_type: row.opt_text(crc_allo::USE_TYPE)?,
            attributes: attributes(row, &[crc_allo::CRC, crc_allo::TAKE_TYPE, crc_allo::ALLO_BLOCK]),
            key,
        })
    }
}

/// Link between a consent block and an extraction point (WAP).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLink {
    pub key: PointKey,
    pub max_rate: Option<f64>,
    pub in_sw_allo: bool,
}

impl TryFrom<&Row> for PointLink {
    type Error = AlloError;

    fn try_from(row: &Row) -> Result<Self> {
        let block = block_key(
            row,
            crc_wap_allo::CRC,
            crc_wap_allo::TAKE_TYPE,
            crc_wap_allo::ALLO_BLOCK,
        )?;
        Ok(PointLink {
            key: block.at(&row.text(crc_wap_allo::WAP)?),
            max_rate: row.opt_f64(crc_wap_allo::MAX_RATE_WAP)?,
            in_sw_allo: row.opt_bool(crc_wap_allo::IN_SW_ALLO)?.unwrap_or(false),
        })
    }
}

/// An extraction point site with its descriptive columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub site_id: String,
    pub attributes: BTreeMap<String, String>,
}

impl TryFrom<&Row> for Site {
    type Error = AlloError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Site {
            site_id: row.text(sites::SITE_ID)?,
            attributes: attributes(row, &[sites::SITE_ID]),
        })
    }
}

fn attributes(row: &Row, skip: &[&str]) -> BTreeMap<String, String> {
    row.values
        .iter()
        .filter(|(column, _)| !skip.contains(&column.as_str()))
        .map(|(column, value)| (column.clone(), value.as_text().trim().to_string()))
        .collect()
}

/// An eligible consent block at one extraction point, ready for apportionment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub key: PointKey,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub months: ActiveMonths,
    pub max_rate: Option<f64>,
    pub daily_vol: Option<f64>,
    pub feav: Option<f64>,
    pub status: String,
    pub in_sw_allo: bool,
    pub in_gw_allo: bool,
}

impl AllocationRecord {
    /// Join a consent block with one of its point links. `share` scales the
    /// block magnitudes to this point. Returns None without validity dates.
    pub fn from_parts(consent: &ConsentRecord, link: &PointLink, share: f64) -> Option<Self> {
        let from_date = consent.from_date?;
        let to_date = consent.to_date?;
        if from_date > to_date {
            return None;
        }
        Some(AllocationRecord {
            key: link.key.clone(),
            from_date,
            to_date,
            months: ActiveMonths {
                from: consent.from_month,
                to: consent.to_month,
            },
            max_rate: consent.max_rate.map(|v| v * share),
            daily_vol: consent.daily_vol.map(|v| v * share),
            feav: consent.feav.map(|v| v * share),
            status: consent.status.clone(),
            in_sw_allo: link.in_sw_allo,
            in_gw_allo: consent.in_gw_allo,
        })
    }
}

/// A validity window, an active season and the allocation magnitudes.
///
/// Implemented by consent blocks and by their per-point records so both can
/// be apportioned.
pub trait Allocation {
    fn validity(&self) -> Option<(NaiveDate, NaiveDate)>;
    fn months(&self) -> ActiveMonths;
    fn max_rate(&self) -> Option<f64>;
    fn daily_vol(&self) -> Option<f64>;
    fn feav(&self) -> Option<f64>;
}

impl Allocation for ConsentRecord {
    fn validity(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.from_date, self.to_date) {
            (Some(from), Some(to)) if from <= to => Some((from, to)),
            _ => None,
        }
    }

    fn months(&self) -> ActiveMonths {
        ActiveMonths {
            from: self.from_month,
            to: self.to_month,
        }
    }

    fn max_rate(&self) -> Option<f64> {
        self.max_rate
    }

    fn daily_vol(&self) -> Option<f64> {
        self.daily_vol
    }

    fn feav(&self) -> Option<f64> {
        self.feav
    }
}

impl Allocation for AllocationRecord {
    fn validity(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.from_date, self.to_date))
    }

    fn months(&self) -> ActiveMonths {
        self.months
    }

    fn max_rate(&self) -> Option<f64> {
        self.max_rate
    }

    fn daily_vol(&self) -> Option<f64> {
        self.daily_vol
    }

    fn feav(&self) -> Option<f64> {
        self.feav
    }
}

/// Which allocation magnitude becomes the time series value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestrictionType {
    MaxRate,
    DailyVolume,
    AnnualVolume,
}

impl RestrictionType {
    /// The magnitude used by default for a frequency.
    pub fn default_for(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily | Frequency::Weekly => RestrictionType::DailyVolume,
            Frequency::Monthly | Frequency::Annual { .. } => RestrictionType::AnnualVolume,
        }
    }

    /// The record's magnitude at the native period of `frequency`.
    ///
    /// Daily accepts the max rate or the daily volume, weekly the daily volume
    /// expressed per week, monthly and annual the annual volume. Monthly values
    /// are still annual here; apportionment scales them per calendar month.
    pub fn magnitude<A: Allocation + ?Sized>(
        &self,
        record: &A,
        frequency: Frequency,
    ) -> Result<Option<f64>> {
        match (frequency, self) {
            (Frequency::Daily, RestrictionType::MaxRate) => Ok(record.max_rate()),
            (Frequency::Daily, RestrictionType::DailyVolume)
            | (Frequency::Weekly, RestrictionType::DailyVolume) => Ok(record.daily_vol()),
            (Frequency::Monthly, RestrictionType::AnnualVolume)
            | (Frequency::Annual { .. }, RestrictionType::AnnualVolume) => Ok(record.feav()),
            _ => Err(AlloError::InvalidRestrictionType {
                restriction: self.to_string(),
                frequency: frequency.code(),
            }),
        }
    }
}

impl fmt::Display for RestrictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestrictionType::MaxRate => "max rate",
            RestrictionType::DailyVolume => "daily volume",
            RestrictionType::AnnualVolume => "annual volume",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RestrictionType {
    type Err = AlloError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', " ").as_str() {
            "max rate" => Ok(RestrictionType::MaxRate),
            "daily volume" => Ok(RestrictionType::DailyVolume),
            "annual volume" => Ok(RestrictionType::AnnualVolume),
            _ => Err(AlloError::InvalidRestrictionType {
                restriction: s.to_string(),
                frequency: "any".to_string(),
            }),
        }
    }
}
