//! Region extraction from a thermal frame.

use super::{compute_stats, RegionStats};
use crate::capture::ThermalFrame;
use crate::geometry::{Dimensions, MeasurementRegion};
use thiserror::Error;

/// Errors raised when a region cannot be measured on a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    /// The region does not fit inside the frame.
    #[error("region {region} exceeds frame {width}x{height}")]
    OutOfBounds {
        /// The rejected region.
        region: MeasurementRegion,
        /// Frame width in cells.
        width: u32,
        /// Frame height in cells.
        height: u32,
    },
    /// Nothing to measure.
    #[error("region has no measurable samples")]
    Empty,
}

/// Copies the samples under `region` out of `frame`, row by row.
pub fn extract_region(
    frame: &ThermalFrame,
    region: &MeasurementRegion,
) -> Result<Vec<f64>, RegionError> {
    let dims = Dimensions::new(frame.width(), frame.height());
    if !region.fits(dims) || frame.grid().len() < frame.cell_count() {
        return Err(RegionError::OutOfBounds {
            region: *region,
            width: frame.width(),
            height: frame.height(),
        });
    }
    if region.is_empty() {
        return Err(RegionError::Empty);
    }

    let stride = frame.width() as usize;
    let left = region.left as usize;
    let width = region.width as usize;
    let grid = frame.grid();

    let mut values = Vec::with_capacity(region.cell_count());
    for row in region.top as usize..region.bottom() as usize {
        let start = row * stride + left;
        values.extend_from_slice(&grid[start..start + width]);
    }
    Ok(values)
}

/// Extracts `region` and reduces it to statistics.
pub fn measure_region(
    frame: &ThermalFrame,
    region: &MeasurementRegion,
) -> Result<RegionStats, RegionError> {
    let values = extract_region(frame, region)?;
    compute_stats(&values, region.width, region.left, region.top).ok_or(RegionError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> ThermalFrame {
        let grid = (0..width * height).map(f64::from).collect();
        ThermalFrame::new(grid, width, height, 0)
    }

    #[test]
    fn test_extract_sub_grid() {
        let frame = ramp(4, 3);
        let values = extract_region(&frame, &MeasurementRegion::new(1, 1, 2, 2)).unwrap();
        assert_eq!(values, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn test_out_of_bounds() {
        let frame = ramp(4, 3);
        let err = extract_region(&frame, &MeasurementRegion::new(3, 0, 2, 1)).unwrap_err();
        assert!(matches!(err, RegionError::OutOfBounds { width: 4, height: 3, .. }));
    }

    #[test]
    fn test_empty_region() {
        let frame = ramp(4, 3);
        assert_eq!(
            extract_region(&frame, &MeasurementRegion::new(1, 1, 0, 2)),
            Err(RegionError::Empty)
        );
    }

    #[test]
    fn test_measure_region_spots_in_frame_coordinates() {
        let frame = ramp(10, 10);
        let stats = measure_region(&frame, &MeasurementRegion::new(2, 3, 4, 5)).unwrap();
        assert_eq!(stats.cold_spot, (2, 3));
        assert_eq!(stats.hot_spot, (5, 7));
        assert_eq!(stats.min, 32.0);
        assert_eq!(stats.max, 75.0);
    }

    #[test]
    fn test_measure_all_nan_is_empty() {
        let frame = ThermalFrame::new(vec![f64::NAN; 4], 2, 2, 0);
        assert_eq!(
            measure_region(&frame, &MeasurementRegion::new(0, 0, 2, 2)),
            Err(RegionError::Empty)
        );
    }
}
