//! Cleaning of raw daily metered usage.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A reading this far above the sum of its neighbours is a spike.
pub const SPIKE_TOLERANCE: f64 = 2.0;

/// Clamp negative readings to zero and flatten isolated single-day spikes.
///
/// Per site, in date order, a reading greater than the sum of its two
/// neighbours plus [`SPIKE_TOLERANCE`] is replaced by the neighbours' mean.
/// Neighbours are taken from the clamped readings before any replacement.
/// The first and last reading of each site are never replaced.
pub fn clean_daily_usage(
    readings: BTreeMap<(String, NaiveDate), f64>,
) -> BTreeMap<(String, NaiveDate), f64> {
    let mut by_site: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for ((site, date), value) in readings {
        by_site.entry(site).or_default().push((date, value.max(0.0)));
    }

    let mut spikes = 0usize;
    let mut cleaned = BTreeMap::new();
    for (site, values) in by_site {
        let last = values.len().saturating_sub(1);
        for (i, (date, value)) in values.iter().enumerate() {
            let mut value = *value;
            if i > 0 && i < last {
                let before = values[i - 1].1;
                let after = values[i + 1].1;
                if value > before + after + SPIKE_TOLERANCE {
                    value = (before + after) / 2.0;
                    spikes += 1;
                }
            }
            cleaned.insert((site.clone(), *date), value);
        }
    }
    if spikes > 0 {
        log::debug!("replaced {spikes} usage spikes");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn readings(site: &str, values: &[f64]) -> BTreeMap<(String, NaiveDate), f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ((site.to_string(), d(i as u32 + 1)), *v))
            .collect()
    }

    #[test]
    fn test_negative_clamped() {
        let cleaned = clean_daily_usage(readings("BS28/5006", &[-3.0, 5.0, 5.0]));
        assert_eq!(cleaned[&("BS28/5006".to_string(), d(1))], 0.0);
    }

    #[test]
    fn test_spike_replaced_by_neighbour_mean() {
        let cleaned = clean_daily_usage(readings("BS28/5006", &[10.0, 100.0, 20.0, 22.0]));
        assert_eq!(cleaned[&("BS28/5006".to_string(), d(2))], 15.0);
        // within tolerance
        assert_eq!(cleaned[&("BS28/5006".to_string(), d(3))], 20.0);
    }

    #[test]
    fn test_edges_and_sites_independent() {
        let mut all = readings("BS28/5006", &[50.0, 1.0, 1.0]);
        all.extend(readings("BS28/5007", &[1.0, 1.0, 50.0]));
        let cleaned = clean_daily_usage(all);
        assert_eq!(cleaned.len(), 6);
        assert_eq!(cleaned[&("BS28/5006".to_string(), d(1))], 50.0);
        assert_eq!(cleaned[&("BS28/5007".to_string(), d(3))], 50.0);
    }
}
