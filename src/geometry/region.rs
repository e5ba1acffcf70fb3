//! User-positioned measurement rectangle.

use super::{Dimensions, DisplayRect};
use serde::{Deserialize, Serialize};

/// Rectangle in sensor-grid cells over which statistics are computed.
///
/// The pipeline snapshots it by value at the start of every frame, so a
/// concurrent edit can never tear a frame's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRegion {
    /// Left column.
    pub left: u32,
    /// Top row.
    pub top: u32,
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl MeasurementRegion {
    /// Region from its top-left cell and size.
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Square region centred in the frame, half the frame width wide
    /// (capped to the frame height).
    pub fn centered(dims: Dimensions) -> Self {
        let side = (dims.width / 2).min(dims.height).max(1);
        Self::new(
            dims.width.saturating_sub(side) / 2,
            dims.height.saturating_sub(side) / 2,
            side,
            side,
        )
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> u64 {
        u64::from(self.left) + u64::from(self.width)
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u64 {
        u64::from(self.top) + u64::from(self.height)
    }

    /// Number of cells covered.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the region covers no cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the region lies entirely inside a grid of `dims`.
    pub fn fits(&self, dims: Dimensions) -> bool {
        self.right() <= u64::from(dims.width) && self.bottom() <= u64::from(dims.height)
    }

    /// Moves the region so it is centred on `(cx, cy)`, clamped to the frame.
    pub fn pan_to(&self, cx: f64, cy: f64, dims: Dimensions) -> Self {
        let width = self.width.min(dims.width);
        let height = self.height.min(dims.height);
        let max_left = f64::from(dims.width - width);
        let max_top = f64::from(dims.height - height);
        let left = (cx - f64::from(width) / 2.0).round().clamp(0.0, max_left);
        let top = (cy - f64::from(height) / 2.0).round().clamp(0.0, max_top);
        Self::new(left as u32, top as u32, width, height)
    }

    /// Scales the region about its centre.
    ///
    /// Returns `None`, leaving the caller's region as it was, when the
    /// result would touch or cross the frame border or be empty.
    pub fn zoom(&self, factor: f64, dims: Dimensions) -> Option<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return None;
        }
        let cx = f64::from(self.left) + f64::from(self.width) / 2.0;
        let cy = f64::from(self.top) + f64::from(self.height) / 2.0;
        let width = (f64::from(self.width) * factor).round();
        let height = (f64::from(self.height) * factor).round();
        let left = (cx - width / 2.0).round();
        let top = (cy - height / 2.0).round();

        let inside = width >= 1.0
            && height >= 1.0
            && left > 0.0
            && top > 0.0
            && left + width < f64::from(dims.width)
            && top + height < f64::from(dims.height);
        inside.then(|| Self::new(left as u32, top as u32, width as u32, height as u32))
    }

    /// The region as a continuous rectangle in sensor space.
    pub fn as_rect(&self) -> DisplayRect {
        DisplayRect::new(
            f64::from(self.left),
            f64::from(self.top),
            f64::from(self.width),
            f64::from(self.height),
        )
    }

    /// Smallest whole-cell region covering `rect`, clamped to the frame.
    pub fn covering(rect: DisplayRect, dims: Dimensions) -> Option<Self> {
        let clamped = rect.clamp_to(dims);
        let left = clamped.left.floor();
        let top = clamped.top.floor();
        let right = clamped.right().ceil();
        let bottom = clamped.bottom().ceil();
        let region = Self::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        );
        (!region.is_empty()).then_some(region)
    }
}

impl Default for MeasurementRegion {
    /// 200x200 cells at the origin; replaced by [`MeasurementRegion::centered`]
    /// once the sensor geometry is known.
    fn default() -> Self {
        Self::new(0, 0, 200, 200)
    }
}

impl std::fmt::Display for MeasurementRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}@({},{})",
            self.width, self.height, self.left, self.top
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 160,
        height: 120,
    };

    #[test]
    fn test_centered_region() {
        let region = MeasurementRegion::centered(DIMS);
        assert_eq!(region, MeasurementRegion::new(40, 20, 80, 80));
        assert!(region.fits(DIMS));
    }

    #[test]
    fn test_centered_capped_by_height() {
        let region = MeasurementRegion::centered(Dimensions::new(200, 40));
        assert_eq!(region.height, 40);
        assert!(region.fits(Dimensions::new(200, 40)));
    }

    #[test]
    fn test_fits_bounds() {
        assert!(MeasurementRegion::new(0, 0, 160, 120).fits(DIMS));
        assert!(!MeasurementRegion::new(1, 0, 160, 120).fits(DIMS));
        assert!(!MeasurementRegion::default().fits(DIMS));
        assert!(!MeasurementRegion::new(u32::MAX, 0, 2, 2).fits(DIMS));
    }

    #[test]
    fn test_pan_clamped() {
        let region = MeasurementRegion::new(10, 10, 20, 20);
        assert_eq!(region.pan_to(80.0, 60.0, DIMS), MeasurementRegion::new(70, 50, 20, 20));
        assert_eq!(region.pan_to(-50.0, 500.0, DIMS), MeasurementRegion::new(0, 100, 20, 20));
        assert_eq!(region.pan_to(1e6, -1e6, DIMS), MeasurementRegion::new(140, 0, 20, 20));
    }

    #[test]
    fn test_zoom_rejected_at_border() {
        let region = MeasurementRegion::centered(DIMS);
        let bigger = region.zoom(1.2, DIMS).expect("fits after zoom");
        assert!(bigger.width > region.width);
        assert!(bigger.fits(DIMS));

        assert_eq!(region.zoom(2.0, DIMS), None);
        assert_eq!(region.zoom(0.0, DIMS), None);
        assert_eq!(region.zoom(0.001, DIMS), None);
    }

    #[test]
    fn test_covering_rounds_outward() {
        let rect = DisplayRect::new(10.4, 5.6, 9.2, 3.1);
        let region = MeasurementRegion::covering(rect, DIMS).unwrap();
        assert_eq!(region, MeasurementRegion::new(10, 5, 10, 4));
    }
}
