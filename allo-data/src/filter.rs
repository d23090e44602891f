//! Narrowing raw consent blocks and point links to the set that can be
//! turned into allocation series.

use allo_core::date_range::Horizon;
use allo_core::error::{AlloError, Result};
use allo_core::record::{AllocationRecord, BlockKey, ConsentRecord, PointLink, PointKey, TakeType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Consent status codes eligible for apportionment.
pub const DEFAULT_STATUS_CODES: [&str; 7] = [
    "Issued - Active",
    "Issued - s124 Continuance",
    "Terminated - Replaced",
    "Terminated - Expired",
    "Terminated - Surrendered",
    "Terminated - Lapsed",
    "Terminated - Cancelled",
];

/// Extraction point ids look like `BS28/5006`.
pub const SITE_ID_PATTERN: &str = r"[A-Z]+\d\d/\d+";

/// A record's overlap with the horizon, and its own span, must exceed this.
pub const MIN_SPAN_DAYS: i64 = 31;

pub const HYDROELECTRIC: &str = "hydroelectric";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    pub status_codes: BTreeSet<String>,
    /// Only keep consumptive takes counted in the allocation.
    pub in_allocation_only: bool,
    pub include_hydroelectric: bool,
    pub site_pattern: String,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            status_codes: DEFAULT_STATUS_CODES.iter().map(|s| s.to_string()).collect(),
            in_allocation_only: true,
            include_hydroelectric: false,
            site_pattern: SITE_ID_PATTERN.to_string(),
        }
    }
}

impl FilterOptions {
    pub fn site_regex(&self) -> Result<Regex> {
        Regex::new(&self.site_pattern).map_err(|e| AlloError::InvalidValue {
            field: "site_pattern".into(),
            value: e.to_string(),
        })
    }
}

/// Consent blocks and point links that survived filtering. Every block has
/// at least one link and every link belongs to a surviving block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Eligible {
    pub consents: Vec<ConsentRecord>,
    pub links: Vec<PointLink>,
}

impl Eligible {
    pub fn block_keys(&self) -> BTreeSet<BlockKey> {
        self.consents.iter().map(|c| c.key.clone()).collect()
    }

    pub fn waps(&self) -> BTreeSet<String> {
        self.links.iter().map(|l| l.key.wap.clone()).collect()
    }

    pub fn crcs(&self) -> BTreeSet<String> {
        self.consents.iter().map(|c| c.key.crc.clone()).collect()
    }

    /// Join each block with its point links.
    ///
    /// A block linked to several points is split among them in proportion to
    /// the point max rates, or equally when any point rate is missing or zero.
    pub fn allocation_records(&self) -> Vec<AllocationRecord> {
        let mut by_block: BTreeMap<&BlockKey, Vec<&PointLink>> = BTreeMap::new();
        for link in &self.links {
            by_block.entry(&link.key.block).or_default().push(link);
        }

        let mut records = Vec::with_capacity(self.links.len());
        for consent in &self.consents {
            let Some(links) = by_block.get(&consent.key) else {
                continue;
            };
            let rated = links.iter().all(|l| l.max_rate.is_some_and(|r| r > 0.0));
            let total: f64 = links.iter().filter_map(|l| l.max_rate).sum();
            for link in links {
                let share = match link.max_rate {
                    Some(rate) if rated && total > 0.0 => rate / total,
                    _ => 1.0 / links.len() as f64,
                };
                if let Some(record) = AllocationRecord::from_parts(consent, link, share) {
                    records.push(record);
                }
            }
        }
        records
    }
}

fn spans_horizon(consent: &ConsentRecord, horizon: &Horizon) -> bool {
    let (Some(from), Some(to)) = (consent.from_date, consent.to_date) else {
        return false;
    };
    if !horizon.bounded {
        return true;
    }
    (to - horizon.start).num_days() > MIN_SPAN_DAYS
        && (horizon.end - from).num_days() > MIN_SPAN_DAYS
        && (to - from).num_days() > MIN_SPAN_DAYS
}

fn is_hydroelectric(consent: &ConsentRecord) -> bool {
    consent
        .use_type
        .as_deref()
        .is_some_and(|u| u.to_ascii_lowercase().contains(HYDROELECTRIC))
}

/// Filter consent blocks and point links to the eligible set.
///
/// Duplicate blocks and links keep their first occurrence. The horizon rules
/// are skipped for an unbounded horizon.
pub fn filter(
    consents: Vec<ConsentRecord>,
    links: Vec<PointLink>,
    horizon: &Horizon,
    options: &FilterOptions,
) -> Result<Eligible> {
    let site_re = options.site_regex()?;
    let consent_count = consents.len();
    let link_count = links.len();

    let mut seen: BTreeSet<BlockKey> = BTreeSet::new();
    let mut consents: Vec<ConsentRecord> = consents
        .into_iter()
        .filter(|c| seen.insert(c.key.clone()))
        .filter(|c| c.key.take_type.is_take())
        .filter(|c| c.daily_vol.is_some())
        .filter(|c| spans_horizon(c, horizon))
        .filter(|c| options.status_codes.contains(&c.status))
        .filter(|c| options.include_hydroelectric || !is_hydroelectric(c))
        .collect();

    let mut seen: BTreeSet<PointKey> = BTreeSet::new();
    let mut links: Vec<PointLink> = links
        .into_iter()
        .filter(|l| seen.insert(l.key.clone()))
        .filter(|l| l.key.block.take_type.is_take())
        .filter(|l| site_re.is_match(&l.key.wap))
        .collect();

    if options.in_allocation_only {
        links.retain(|l| l.key.block.take_type == TakeType::Groundwater || l.in_sw_allo);
        let sw_crcs: BTreeSet<String> = links
            .iter()
            .filter(|l| l.key.block.take_type == TakeType::SurfaceWater)
            .map(|l| l.key.block.crc.clone())
            .collect();
        consents.retain(|c| match c.key.take_type {
            TakeType::Groundwater => c.in_gw_allo,
            TakeType::SurfaceWater => sw_crcs.contains(&c.key.crc),
            TakeType::Other(_) => false,
        });
    }

    // Each side can orphan rows on the other, so both directions run.
    let blocks: BTreeSet<BlockKey> = consents.iter().map(|c| c.key.clone()).collect();
    links.retain(|l| blocks.contains(&l.key.block));
    let linked: BTreeSet<BlockKey> = links.iter().map(|l| l.key.block.clone()).collect();
    consents.retain(|c| linked.contains(&c.key));

    log::info!(
        "{} of {} consent blocks and {} of {} point links eligible",
        consents.len(),
        consent_count,
        links.len(),
        link_count
    );
    Ok(Eligible { consents, links })
}
