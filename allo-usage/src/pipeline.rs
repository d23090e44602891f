//! The allocation and usage pipeline.
//!
//! [`AlloUsage`] reads the eligible consents once at construction, then
//! derives allocation, restriction and usage series on request. Derived
//! series are memoised under the parameters that produced them; raw reads
//! of usage and low flow data are kept for the lifetime of the instance.

use crate::cache::{EntitySeries, MemoCache};
use crate::params::{Dataset, MeteredMode, Parameters, Request};
use crate::reader::{
    read_consents, read_daily_restrictions, read_daily_usage, read_links, read_sites,
    read_usage_sites, ColumnFilters,
};
use crate::table::OutputTable;
use allo_core::date_range::Horizon;
use allo_core::error::{AlloError, Result};
use allo_core::frequency::IRRIGATION_SEASON;
use allo_core::record::{AllocationRecord, BlockKey, ConsentRecord, PointKey, RestrictionType, Site};
use allo_core::schema::key;
use allo_core::source::SourceStore;
use allo_data::aggregate::aggregate;
use allo_data::apportion::{apportion_points, ApportionedSeries};
use allo_data::filter::{filter, FilterOptions};
use allo_data::usage::clean_daily_usage;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Dataset type ids of metered abstraction series.
pub const DEFAULT_USAGE_DATASET_TYPES: [i64; 2] = [9, 12];

/// Equality filters applied when reading the site, consent and point link
/// tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub site_filter: ColumnFilters,
    pub crc_filter: ColumnFilters,
    pub crc_wap_filter: ColumnFilters,
}

/// Raw reads, kept across parameter changes.
#[derive(Debug, Default)]
struct RawCache {
    daily_usage: Option<BTreeMap<(String, NaiveDate), f64>>,
    daily_restrictions: Option<BTreeMap<(String, NaiveDate), f64>>,
}

#[derive(Debug, Clone, PartialEq)]
enum GroupColumn {
    Key(String),
    Site(String),
    Consent(String),
}

fn entity_series(flat: BTreeMap<(String, NaiveDate), f64>) -> EntitySeries {
    let mut nested = EntitySeries::new();
    for ((entity, date), value) in flat {
        nested.entry(entity).or_default().insert(date, value);
    }
    nested
}

fn bucketed(
    daily: &BTreeMap<(String, NaiveDate), f64>,
    frequency: allo_core::frequency::Frequency,
) -> allo_data::aggregate::Grouped<String> {
    aggregate(
        daily
            .iter()
            .map(|((entity, date), value)| (entity.clone(), *date, *value)),
        frequency,
    )
}

pub struct AlloUsage<S: SourceStore> {
    store: S,
    horizon: Horizon,
    usage_dataset_types: Vec<i64>,
    sites: BTreeMap<String, Site>,
    consents: BTreeMap<BlockKey, ConsentRecord>,
    records: Vec<AllocationRecord>,
    raw: RawCache,
    cache: MemoCache,
}

impl<S: SourceStore> AlloUsage<S> {
    /// Read and filter the sites, consents and point links for `horizon`.
    pub fn new(
        store: S,
        horizon: Horizon,
        selection: &Selection,
        options: &FilterOptions,
    ) -> Result<Self> {
        let site_re = options.site_regex()?;
        let mut sites: BTreeMap<String, Site> = read_sites(&store, &selection.site_filter)?
            .into_iter()
            .filter(|s| site_re.is_match(&s.site_id))
            .map(|s| (s.site_id.clone(), s))
            .collect();
        let links = read_links(&store, &selection.crc_wap_filter)?
            .into_iter()
            .filter(|l| sites.contains_key(&l.key.wap))
            .collect();
        let consents = read_consents(&store, &selection.crc_filter)?;

        let eligible = filter(consents, links, &horizon, options)?;
        let waps = eligible.waps();
        sites.retain(|id, _| waps.contains(id));
        let records = eligible.allocation_records();
        log::info!(
            "pipeline: {} consent blocks, {} points, {} point records between {} and {}",
            eligible.consents.len(),
            sites.len(),
            records.len(),
            horizon.start,
            horizon.end
        );

        let consents = eligible
            .consents
            .into_iter()
            .map(|c| (c.key.clone(), c))
            .collect();
        Ok(Self {
            store,
            horizon,
            usage_dataset_types: DEFAULT_USAGE_DATASET_TYPES.to_vec(),
            sites,
            consents,
            records,
            raw: RawCache::default(),
            cache: MemoCache::default(),
        })
    }

    /// Use these dataset type ids when selecting metered usage series.
    pub fn with_usage_dataset_types(mut self, dataset_types: Vec<i64>) -> Self {
        self.usage_dataset_types = dataset_types;
        self.raw.daily_usage = None;
        self.cache = MemoCache::default();
        self
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn sites(&self) -> &BTreeMap<String, Site> {
        &self.sites
    }

    pub fn consents(&self) -> &BTreeMap<BlockKey, ConsentRecord> {
        &self.consents
    }

    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of derived series computed so far.
    pub fn computations(&self) -> usize {
        self.cache.computations()
    }

    /// Compute the requested datasets and group them.
    ///
    /// Derived series are reused while the parameters stay the same and are
    /// all recomputed after any parameter changes. Annual output is a rollup
    /// of monthly series.
    pub fn compute(&mut self, request: &Request) -> Result<OutputTable> {
        let params = request.parameters()?;
        if request.datasets.is_empty() {
            return Err(AlloError::InvalidDatasetName("no dataset requested".into()));
        }
        let columns = self.resolve_group_by(&request.group_by)?;
        if self.cache.sync(params) {
            log::info!("pipeline: parameters changed, derived series cleared");
        }
        for dataset in &request.datasets {
            self.ensure(*dataset, &params)?;
        }

        let mut entries = Vec::new();
        for (index, dataset) in request.datasets.iter().enumerate() {
            let Some(series) = self.series(*dataset) else {
                continue;
            };
            let rolled;
            let series = if request.frequency.is_annual() {
                rolled = aggregate(
                    series.iter().map(|((k, date), v)| (k.clone(), *date, *v)),
                    request.frequency,
                )
                .sum();
                &rolled
            } else {
                series
            };
            for ((point, date), value) in series {
                entries.push((self.group_values(&columns, point), *date, index, *value));
            }
        }

        let names = columns
            .into_iter()
            .map(|c| match c {
                GroupColumn::Key(name) | GroupColumn::Site(name) | GroupColumn::Consent(name) => {
                    name
                }
            })
            .collect();
        let table = OutputTable::from_entries(names, request.datasets.clone(), entries);
        log::info!(
            "pipeline: {} rows of {:?} at {}",
            table.len(),
            request.datasets,
            request.frequency
        );
        Ok(table)
    }

    fn resolve_group_by(&self, columns: &[String]) -> Result<Vec<GroupColumn>> {
        let mut resolved: Vec<GroupColumn> = Vec::new();
        let mut seen = BTreeSet::new();
        for column in columns {
            if column == key::DATE || !seen.insert(column.as_str()) {
                continue;
            }
            let kind = if key::PRIMARY.contains(&column.as_str()) {
                GroupColumn::Key(column.clone())
            } else if self.sites.values().any(|s| s.attributes.contains_key(column)) {
                GroupColumn::Site(column.clone())
            } else if self.consents.values().any(|c| c.attributes.contains_key(column)) {
                GroupColumn::Consent(column.clone())
            } else {
                return Err(AlloError::UnknownColumn(column.clone()));
            };
            resolved.push(kind);
        }
        Ok(resolved)
    }

    /// Missing site or consent attributes group as empty text.
    fn group_values(&self, columns: &[GroupColumn], point: &PointKey) -> Vec<String> {
        columns
            .iter()
            .map(|column| match column {
                GroupColumn::Key(name) => point.column(name).unwrap_or_default(),
                GroupColumn::Site(name) => self
                    .sites
                    .get(&point.wap)
                    .and_then(|s| s.attributes.get(name))
                    .cloned()
                    .unwrap_or_default(),
                GroupColumn::Consent(name) => self
                    .consents
                    .get(&point.block)
                    .and_then(|c| c.attributes.get(name))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn series(&self, dataset: Dataset) -> Option<&ApportionedSeries> {
        let derived = &self.cache.derived;
        match dataset {
            Dataset::Allocation => derived.allocation.as_ref(),
            Dataset::MeteredAllocation => derived.metered_allocation.as_ref(),
            Dataset::RestrictedAllocation => derived.restricted_allocation.as_ref(),
            Dataset::MeteredRestrictedAllocation => derived.metered_restricted_allocation.as_ref(),
            Dataset::Usage => derived.usage.as_ref(),
        }
    }

    fn ensure(&mut self, dataset: Dataset, params: &Parameters) -> Result<()> {
        match dataset {
            Dataset::Allocation => self.ensure_allocation(params),
            Dataset::RestrictedAllocation => self.ensure_restricted(params),
            Dataset::Usage => self.ensure_usage(params),
            Dataset::MeteredAllocation => self.ensure_metered(params, false),
            Dataset::MeteredRestrictedAllocation => self.ensure_metered(params, true),
        }
    }

    fn ensure_allocation(&mut self, params: &Parameters) -> Result<()> {
        if self.cache.derived.allocation.is_some() {
            return Ok(());
        }
        let restriction = RestrictionType::default_for(params.frequency);
        let mut series = apportion_points(
            &self.records,
            &self.horizon,
            params.frequency,
            restriction,
            true,
        )?;
        if params.irrigation_season && !params.frequency.is_annual() {
            series.retain(|(_, date), _| IRRIGATION_SEASON.contains(date.month()));
        }
        self.cache.computed("allocation");
        self.cache.derived.allocation = Some(series);
        Ok(())
    }

    fn ensure_restriction_ratio(&mut self, params: &Parameters) -> Result<()> {
        if self.cache.derived.restriction_ratio.is_some() {
            return Ok(());
        }
        let daily = match self.raw.daily_restrictions.take() {
            Some(daily) => daily,
            None => {
                let crcs = self.consents.keys().map(|k| k.crc.clone()).collect();
                read_daily_restrictions(&self.store, &crcs, &self.horizon)?
            }
        };
        let ratio = entity_series(bucketed(&daily, params.frequency).mean());
        self.raw.daily_restrictions = Some(daily);
        self.cache.computed("restriction ratio");
        self.cache.derived.restriction_ratio = Some(ratio);
        Ok(())
    }

    fn ensure_restricted(&mut self, params: &Parameters) -> Result<()> {
        self.ensure_allocation(params)?;
        self.ensure_restriction_ratio(params)?;
        let derived = &self.cache.derived;
        if derived.restricted_allocation.is_some() {
            return Ok(());
        }
        let (Some(allocation), Some(ratio)) = (&derived.allocation, &derived.restriction_ratio)
        else {
            return Ok(());
        };
        let restricted = allocation
            .iter()
            .map(|((point, date), value)| {
                let r = ratio
                    .get(&point.block.crc)
                    .and_then(|dates| dates.get(date))
                    .copied()
                    .unwrap_or(1.0);
                ((point.clone(), *date), value * r)
            })
            .collect();
        self.cache.computed("restricted allocation");
        self.cache.derived.restricted_allocation = Some(restricted);
        Ok(())
    }

    fn ensure_point_usage(&mut self, params: &Parameters) -> Result<()> {
        if self.cache.derived.point_usage.is_some() {
            return Ok(());
        }
        let daily = match self.raw.daily_usage.take() {
            Some(daily) => daily,
            None => {
                let waps = self.sites.keys().cloned().collect();
                let metered = read_usage_sites(
                    &self.store,
                    &waps,
                    &self.usage_dataset_types,
                    &self.horizon,
                )?;
                let raw = read_daily_usage(
                    &self.store,
                    &metered,
                    &self.usage_dataset_types,
                    &self.horizon,
                )?;
                clean_daily_usage(raw)
            }
        };
        let usage = entity_series(bucketed(&daily, params.frequency).sum());
        self.raw.daily_usage = Some(daily);
        self.cache.computed("point usage");
        self.cache.derived.point_usage = Some(usage);
        Ok(())
    }

    /// Split each point's metered usage among the consents sharing it, in
    /// proportion to their allocation. Estimates above the usage cutoff are
    /// outliers and dropped along with rows lacking usage.
    fn ensure_usage(&mut self, params: &Parameters) -> Result<()> {
        self.ensure_allocation(params)?;
        self.ensure_point_usage(params)?;
        let derived = &self.cache.derived;
        if derived.usage.is_some() {
            return Ok(());
        }
        let (Some(allocation), Some(point_usage)) = (&derived.allocation, &derived.point_usage)
        else {
            return Ok(());
        };

        let mut combined: BTreeMap<(&str, NaiveDate), f64> = BTreeMap::new();
        for ((point, date), value) in allocation {
            *combined.entry((point.wap.as_str(), *date)).or_insert(0.0) += value;
        }

        let mut usage = ApportionedSeries::new();
        let mut outliers = 0usize;
        for ((point, date), allocated) in allocation {
            let Some(metered) = point_usage.get(&point.wap).and_then(|dates| dates.get(date)) else {
                continue;
            };
            let total = combined
                .get(&(point.wap.as_str(), *date))
                .copied()
                .unwrap_or(0.0);
            if total <= 0.0 {
                continue;
            }
            let estimate = metered * allocated / total;
            if estimate > params.usage_allocation_ratio * allocated {
                outliers += 1;
                continue;
            }
            usage.insert((point.clone(), *date), estimate);
        }
        if outliers > 0 {
            log::warn!(
                "pipeline: dropped {} usage values above {} x allocation",
                outliers,
                params.usage_allocation_ratio
            );
        }
        self.cache.computed("usage");
        self.cache.derived.usage = Some(usage);
        Ok(())
    }

    fn ensure_metered(&mut self, params: &Parameters, restricted: bool) -> Result<()> {
        if restricted {
            self.ensure_restricted(params)?;
        } else {
            self.ensure_allocation(params)?;
        }
        self.ensure_usage(params)?;
        let derived = &self.cache.derived;
        let (done, source) = if restricted {
            (
                derived.metered_restricted_allocation.is_some(),
                &derived.restricted_allocation,
            )
        } else {
            (derived.metered_allocation.is_some(), &derived.allocation)
        };
        if done {
            return Ok(());
        }
        let (Some(source), Some(usage)) = (source, &derived.usage) else {
            return Ok(());
        };

        let metered: ApportionedSeries = match params.metered_mode {
            MeteredMode::Proportional => source
                .iter()
                .map(|((point, date), value)| {
                    let key = (point.clone(), *date);
                    let value = if usage.contains_key(&key) { *value } else { 0.0 };
                    (key, value)
                })
                .collect(),
            MeteredMode::AnyPointPresent => {
                let present: BTreeSet<(&BlockKey, NaiveDate)> =
                    usage.keys().map(|(point, date)| (&point.block, *date)).collect();
                source
                    .iter()
                    .map(|((point, date), value)| {
                        let value = if present.contains(&(&point.block, *date)) {
                            *value
                        } else {
                            0.0
                        };
                        ((point.clone(), *date), value)
                    })
                    .collect()
            }
        };
        if restricted {
            self.cache.computed("metered restricted allocation");
            self.cache.derived.metered_restricted_allocation = Some(metered);
        } else {
            self.cache.computed("metered allocation");
            self.cache.derived.metered_allocation = Some(metered);
        }
        Ok(())
    }
}
