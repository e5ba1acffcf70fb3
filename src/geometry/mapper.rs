//! Sensor ↔ display coordinate mapping.
//!
//! The thermal grid, the rendered bitmap and the visual image all have
//! different resolutions. Each [`CoordinateMapper`] is an independent
//! per-axis scale plus an optional placement offset, so a thermal view
//! drawn picture-in-picture inside a larger surface maps correctly too.

use thiserror::Error;

/// A point in continuous coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Centre of the integer cell `(x, y)`.
    pub fn cell_center(x: u32, y: u32) -> Self {
        Self::new(f64::from(x) + 0.5, f64::from(y) + 0.5)
    }
}

/// Width and height of a grid or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Dimensions {
    /// Size `width` by `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either side is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle in continuous coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayRect {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl DisplayRect {
    /// Rectangle from its top-left corner and size.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge.
    #[inline]
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    /// Bottom edge.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Intersects the rectangle with `[0, w) x [0, h)`.
    pub fn clamp_to(&self, bounds: Dimensions) -> Self {
        let w = f64::from(bounds.width);
        let h = f64::from(bounds.height);
        let left = self.left.clamp(0.0, w);
        let top = self.top.clamp(0.0, h);
        let right = self.right().clamp(0.0, w);
        let bottom = self.bottom().clamp(0.0, h);
        Self::new(left, top, right - left, bottom - top)
    }

    /// Rounded integer pixel rectangle, or `None` when it covers no pixel.
    pub fn to_pixels(&self) -> Option<(i32, i32, u32, u32)> {
        let left = self.left.round();
        let top = self.top.round();
        let width = (self.right().round() - left).max(0.0);
        let height = (self.bottom().round() - top).max(0.0);
        if width < 1.0 || height < 1.0 {
            return None;
        }
        Some((left as i32, top as i32, width as u32, height as u32))
    }
}

/// Mapping errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// One of the spaces has a zero dimension.
    #[error("mapper not ready: {from:?} -> {to:?}")]
    NotReady {
        /// Source space.
        from: Dimensions,
        /// Target space.
        to: Dimensions,
    },
}

/// Forward and inverse mapping between two coordinate spaces.
pub trait Mapping {
    /// Maps a sensor-space point into display space.
    fn to_display(&self, point: Point) -> Point;

    /// Maps a display-space point back into sensor space.
    fn to_sensor(&self, point: Point) -> Point;

    /// Maps a sensor-space rectangle into display space.
    fn rect_to_display(&self, rect: DisplayRect) -> DisplayRect {
        map_corners(rect, |p| self.to_display(p))
    }

    /// Maps a display-space rectangle back into sensor space.
    fn rect_to_sensor(&self, rect: DisplayRect) -> DisplayRect {
        map_corners(rect, |p| self.to_sensor(p))
    }
}

fn map_corners(rect: DisplayRect, map: impl Fn(Point) -> Point) -> DisplayRect {
    let a = map(Point::new(rect.left, rect.top));
    let b = map(Point::new(rect.right(), rect.bottom()));
    let left = a.x.min(b.x);
    let top = a.y.min(b.y);
    DisplayRect::new(left, top, (a.x - b.x).abs(), (a.y - b.y).abs())
}

/// Single-stage affine mapper: `display = sensor * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale_x: f64,
    scale_y: f64,
    offset: Point,
}

impl CoordinateMapper {
    /// Creates a mapper from `from` space to `to` space.
    ///
    /// Both dimensions must be known (non-zero); a mapper built before
    /// the first frame reports [`MappingError::NotReady`].
    pub fn new(from: Dimensions, to: Dimensions) -> Result<Self, MappingError> {
        if from.is_empty() || to.is_empty() {
            return Err(MappingError::NotReady { from, to });
        }
        Ok(Self {
            scale_x: f64::from(to.width) / f64::from(from.width),
            scale_y: f64::from(to.height) / f64::from(from.height),
            offset: Point::default(),
        })
    }

    /// Places the target space at `offset` inside a larger surface.
    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    /// Display pixels per sensor unit, horizontally.
    #[inline]
    pub fn scale_x(&self) -> f64 {
        self.scale_x
    }

    /// Display pixels per sensor unit, vertically.
    #[inline]
    pub fn scale_y(&self) -> f64 {
        self.scale_y
    }

    /// Origin of the target space.
    #[inline]
    pub fn offset(&self) -> Point {
        self.offset
    }
}

impl Mapping for CoordinateMapper {
    #[inline]
    fn to_display(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale_x + self.offset.x,
            point.y * self.scale_y + self.offset.y,
        )
    }

    #[inline]
    fn to_sensor(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.offset.x) / self.scale_x,
            (point.y - self.offset.y) / self.scale_y,
        )
    }
}

/// Two mappers applied in sequence.
///
/// The forward direction applies `first` then `second` (sensor grid to
/// thermal bitmap, then thermal bitmap to visual image). The inverse
/// applies `second`'s inverse before `first`'s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainedMapper {
    first: CoordinateMapper,
    second: CoordinateMapper,
}

impl ChainedMapper {
    /// Chains `first` then `second`.
    pub fn new(first: CoordinateMapper, second: CoordinateMapper) -> Self {
        Self { first, second }
    }
}

impl Mapping for ChainedMapper {
    fn to_display(&self, point: Point) -> Point {
        self.second.to_display(self.first.to_display(point))
    }

    fn to_sensor(&self, point: Point) -> Point {
        self.first.to_sensor(self.second.to_sensor(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mapper(fw: u32, fh: u32, tw: u32, th: u32) -> CoordinateMapper {
        CoordinateMapper::new(Dimensions::new(fw, fh), Dimensions::new(tw, th)).unwrap()
    }

    #[test]
    fn test_independent_axis_scaling() {
        let m = mapper(160, 120, 640, 240);
        assert_abs_diff_eq!(m.scale_x(), 4.0);
        assert_abs_diff_eq!(m.scale_y(), 2.0);

        let p = m.to_display(Point::new(10.0, 10.0));
        assert_abs_diff_eq!(p.x, 40.0);
        assert_abs_diff_eq!(p.y, 20.0);
    }

    #[test]
    fn test_zero_dimensions_not_ready() {
        let err = CoordinateMapper::new(Dimensions::new(0, 120), Dimensions::new(640, 480));
        assert!(matches!(err, Err(MappingError::NotReady { .. })));
    }

    #[test]
    fn test_round_trip_with_offset() {
        let m = mapper(80, 60, 480, 640).with_offset(Point::new(12.0, -7.5));
        let p = Point::new(33.25, 17.75);
        let back = m.to_sensor(m.to_display(p));
        assert_abs_diff_eq!(back.x, p.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn test_rect_mapping() {
        let m = mapper(160, 120, 640, 480);
        let r = m.rect_to_display(DisplayRect::new(40.0, 30.0, 80.0, 60.0));
        assert_eq!(r, DisplayRect::new(160.0, 120.0, 320.0, 240.0));
        assert_eq!(m.rect_to_sensor(r), DisplayRect::new(40.0, 30.0, 80.0, 60.0));
    }

    #[test]
    fn test_chained_stage_order() {
        // Offset in the first stage is scaled by the second; swapping the
        // stages gives a different answer.
        let first = mapper(160, 120, 320, 240).with_offset(Point::new(10.0, 0.0));
        let second = mapper(320, 240, 640, 480);
        let chained = ChainedMapper::new(first, second);

        let p = chained.to_display(Point::new(0.0, 0.0));
        assert_abs_diff_eq!(p.x, 20.0);

        let swapped = ChainedMapper::new(second, first);
        assert!((swapped.to_display(Point::new(0.0, 0.0)).x - p.x).abs() > 1.0);

        let back = chained.to_sensor(p);
        assert_abs_diff_eq!(back.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clamp_to_bounds() {
        let r = DisplayRect::new(-10.0, 5.0, 50.0, 200.0).clamp_to(Dimensions::new(30, 100));
        assert_eq!(r, DisplayRect::new(0.0, 5.0, 30.0, 95.0));
        assert_eq!(r.to_pixels(), Some((0, 5, 30, 95)));
        assert_eq!(DisplayRect::new(5.0, 5.0, 0.2, 3.0).to_pixels(), None);
    }
}
