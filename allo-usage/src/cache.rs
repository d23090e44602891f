//! Memoised derived series, tagged with the parameters that produced them.

use crate::params::Parameters;
use allo_data::apportion::ApportionedSeries;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Values per entity id (consent or site) and bucket start.
pub type EntitySeries = BTreeMap<String, BTreeMap<NaiveDate, f64>>;

/// Series derived at the current parameters. Every field is a pure function
/// of the parameters and the instance's immutable inputs.
#[derive(Debug, Default, Clone)]
pub struct Derived {
    pub allocation: Option<ApportionedSeries>,
    pub restriction_ratio: Option<EntitySeries>,
    pub restricted_allocation: Option<ApportionedSeries>,
    pub point_usage: Option<EntitySeries>,
    pub usage: Option<ApportionedSeries>,
    pub metered_allocation: Option<ApportionedSeries>,
    pub metered_restricted_allocation: Option<ApportionedSeries>,
}

/// Derived series plus the parameter tuple they were computed with.
///
/// Any change of parameters drops every derived series at once.
#[derive(Debug, Default)]
pub struct MemoCache {
    params: Option<Parameters>,
    pub derived: Derived,
    computations: usize,
}

impl MemoCache {
    /// Adopt `params`. Returns true when this cleared previously derived series.
    pub fn sync(&mut self, params: Parameters) -> bool {
        if self.params == Some(params) {
            return false;
        }
        let had_params = self.params.is_some();
        self.params = Some(params);
        self.derived = Derived::default();
        had_params
    }

    pub fn params(&self) -> Option<&Parameters> {
        self.params.as_ref()
    }

    /// Record that one derived series was computed.
    pub fn computed(&mut self, what: &str) {
        self.computations += 1;
        log::debug!("derived {} (computation {})", what, self.computations);
    }

    /// Number of derived series computed over the cache's lifetime.
    pub fn computations(&self) -> usize {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Dataset, Request};
    use allo_core::frequency::Frequency;

    fn params(frequency: Frequency) -> Parameters {
        Request::new(&[Dataset::Allocation], frequency)
            .parameters()
            .unwrap()
    }

    #[test]
    fn test_sync_keeps_series_for_same_params() {
        let mut cache = MemoCache::default();
        assert!(!cache.sync(params(Frequency::Daily)));
        cache.derived.allocation = Some(ApportionedSeries::new());
        assert!(!cache.sync(params(Frequency::Daily)));
        assert!(cache.derived.allocation.is_some());
    }

    #[test]
    fn test_sync_clears_on_change() {
        let mut cache = MemoCache::default();
        cache.sync(params(Frequency::Daily));
        cache.derived.allocation = Some(ApportionedSeries::new());
        cache.derived.point_usage = Some(EntitySeries::new());
        assert!(cache.sync(params(Frequency::Weekly)));
        assert!(cache.derived.allocation.is_none());
        assert!(cache.derived.point_usage.is_none());
        assert_eq!(cache.params().unwrap().frequency, Frequency::Weekly);

        let mut irrigation = params(Frequency::Weekly);
        irrigation.irrigation_season = true;
        cache.derived.allocation = Some(ApportionedSeries::new());
        assert!(cache.sync(irrigation));
        assert!(cache.derived.allocation.is_none());
    }
}
