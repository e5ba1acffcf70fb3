//! Region statistics.
//!
//! A single pass over the samples of a rectangular region yields the
//! minimum, maximum, average and the grid positions of the hottest and
//! coldest cells. Values are compared unrounded; rounding to two decimals
//! is a presentation concern (see [`RegionStats::summary`]).

use crate::capture::{round2, TemperatureUnit};

/// Statistics over one measurement region. Temperatures in Kelvin,
/// spots in sensor-grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    /// Lowest value.
    pub min: f64,
    /// Highest value.
    pub max: f64,
    /// Mean over all cells.
    pub average: f64,
    /// Position of the first maximum in row-major order.
    pub hot_spot: (u32, u32),
    /// Position of the first minimum in row-major order.
    pub cold_spot: (u32, u32),
    /// Number of finite samples that contributed.
    pub count: usize,
}

impl RegionStats {
    /// One log line: `Min: x; Max: y; Avg: z`, two decimals in `unit`.
    pub fn summary(&self, unit: TemperatureUnit) -> String {
        format!(
            "Min: {}; Max: {}; Avg: {}",
            round2(unit.from_kelvin(self.min)),
            round2(unit.from_kelvin(self.max)),
            round2(unit.from_kelvin(self.average)),
        )
    }
}

/// Reduces a row-major region slice to [`RegionStats`].
///
/// `values` holds the region's samples, `region_width` cells per row;
/// flat index `i` maps to `(region_left + i % width, region_top + i / width)`.
/// Ties resolve to the first occurrence. Non-finite samples are skipped.
/// Returns `None` for an empty slice, a zero width, or when no sample is
/// finite.
pub fn compute_stats(
    values: &[f64],
    region_width: u32,
    region_left: u32,
    region_top: u32,
) -> Option<RegionStats> {
    if values.is_empty() || region_width == 0 {
        return None;
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut min_index = 0usize;
    let mut max_index = 0usize;
    let mut sum = 0.0;
    let mut count = 0usize;

    for (i, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        if count == 0 || value < min {
            min = value;
            min_index = i;
        }
        if count == 0 || value > max {
            max = value;
            max_index = i;
        }
        sum += value;
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let to_cell = |index: usize| {
        let width = region_width as usize;
        (
            region_left + (index % width) as u32,
            region_top + (index / width) as u32,
        )
    };

    Some(RegionStats {
        min,
        max,
        average: sum / count as f64,
        hot_spot: to_cell(max_index),
        cold_spot: to_cell(min_index),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ramp_grid() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let stats = compute_stats(&values, 10, 0, 0).unwrap();

        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 99.0);
        assert_abs_diff_eq!(stats.average, 49.5);
        assert_eq!(stats.cold_spot, (0, 0));
        assert_eq!(stats.hot_spot, (9, 9));
        assert_eq!(stats.count, 100);
    }

    #[test]
    fn test_offset_region() {
        let values = [1.0, 5.0, 3.0, 0.5];
        let stats = compute_stats(&values, 2, 7, 3).unwrap();
        assert_eq!(stats.hot_spot, (8, 3));
        assert_eq!(stats.cold_spot, (8, 4));
    }

    #[test]
    fn test_empty_region() {
        assert_eq!(compute_stats(&[], 4, 0, 0), None);
        assert_eq!(compute_stats(&[1.0], 0, 0, 0), None);
    }

    #[test]
    fn test_first_occurrence_wins_ties() {
        let values = [2.0, 7.0, 7.0, 2.0];
        let stats = compute_stats(&values, 2, 0, 0).unwrap();
        assert_eq!(stats.hot_spot, (1, 0));
        assert_eq!(stats.cold_spot, (0, 0));
    }

    #[test]
    fn test_constant_region() {
        let stats = compute_stats(&[300.0; 6], 3, 1, 1).unwrap();
        assert_eq!(stats.hot_spot, (1, 1));
        assert_eq!(stats.cold_spot, (1, 1));
        assert_abs_diff_eq!(stats.average, 300.0);
    }

    #[test]
    fn test_non_finite_skipped() {
        let values = [f64::NAN, 3.0, f64::INFINITY, 1.0];
        let stats = compute_stats(&values, 2, 0, 0).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.hot_spot, (1, 0));
        assert_abs_diff_eq!(stats.average, 2.0);

        assert_eq!(compute_stats(&[f64::NAN, f64::NAN], 2, 0, 0), None);
    }

    #[test]
    fn test_summary_rounds_in_unit() {
        let stats = RegionStats {
            min: 273.15,
            max: 310.154,
            average: 300.0,
            hot_spot: (0, 0),
            cold_spot: (0, 0),
            count: 1,
        };
        assert_eq!(
            stats.summary(TemperatureUnit::Celsius),
            "Min: 0; Max: 37; Avg: 26.85"
        );
        assert_eq!(
            stats.summary(TemperatureUnit::Kelvin),
            "Min: 273.15; Max: 310.15; Avg: 300"
        );
    }
}
