//! Measurement overlay: region outline, spot markers and labels.
//!
//! Geometry is resolved once, in display pixels, when the overlay is
//! built. Drawing is a separate step so the same overlay can be painted
//! onto any copy of the base image. Labels are carried as annotations
//! anchored where a text renderer should draw them.

use crate::analysis::RegionStats;
use crate::capture::{round2, TemperatureUnit};
use crate::geometry::{Dimensions, DisplayRect, Mapping, MeasurementRegion, Point};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Region outline and average label.
pub const REGION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Hot spot marker and max label.
pub const HOT_SPOT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Cold spot marker and min label.
pub const COLD_SPOT_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Face box and face label.
pub const FACE_COLOR: Rgb<u8> = Rgb([255, 0, 255]);

/// Marker radius in sensor cells.
const MARKER_RADIUS_CELLS: f64 = 5.0 / 4.0;
/// Label offsets in sensor cells.
const AVG_LABEL_LIFT_CELLS: f64 = 5.0 / 4.0;
const SPOT_LABEL_DROP_CELLS: f64 = 5.0;

/// What a label shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Region average.
    Average,
    /// Region maximum, at the hot spot.
    Max,
    /// Region minimum, at the cold spot.
    Min,
}

/// Text annotation anchored at its baseline-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLabel {
    /// What the label shows.
    pub kind: LabelKind,
    /// Formatted text, unit included.
    pub text: String,
    /// Baseline-left corner in display pixels.
    pub anchor: Point,
    /// Text colour.
    pub color: Rgb<u8>,
}

/// Filled circular marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotMarker {
    /// Centre in display pixels.
    pub center: Point,
    /// Radius in display pixels.
    pub radius: f64,
    /// Fill colour.
    pub color: Rgb<u8>,
}

/// Everything drawn over the base image for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementOverlay {
    /// Region outline in display pixels.
    pub region: DisplayRect,
    /// Outline width in display pixels.
    pub stroke: u32,
    /// Marker on the hot spot.
    pub hot_marker: SpotMarker,
    /// Marker on the cold spot.
    pub cold_marker: SpotMarker,
    /// Average, max and min labels.
    pub labels: Vec<OverlayLabel>,
    /// The statistics the labels were formatted from (Kelvin).
    pub stats: RegionStats,
    /// Unit the labels are formatted in.
    pub unit: TemperatureUnit,
}

impl MeasurementOverlay {
    /// Resolves the overlay for `region` and its `stats` through `mapper`.
    pub fn build(
        stats: RegionStats,
        region: &MeasurementRegion,
        mapper: &impl Mapping,
        unit: TemperatureUnit,
    ) -> Self {
        let rect = mapper.rect_to_display(region.as_rect());
        let unit_scale = {
            let origin = mapper.to_display(Point::new(0.0, 0.0));
            let one = mapper.to_display(Point::new(1.0, 1.0));
            ((one.x - origin.x).abs(), (one.y - origin.y).abs())
        };
        let stroke = (2.0 * unit_scale.0 / 4.0).round().max(1.0) as u32;
        let radius = (MARKER_RADIUS_CELLS * unit_scale.0).max(2.0);

        let hot = mapper.to_display(Point::cell_center(stats.hot_spot.0, stats.hot_spot.1));
        let cold = mapper.to_display(Point::cell_center(stats.cold_spot.0, stats.cold_spot.1));
        let symbol = unit.symbol();
        let fmt = |kelvin: f64| format!("{} {}", round2(unit.from_kelvin(kelvin)), symbol);

        let labels = vec![
            OverlayLabel {
                kind: LabelKind::Average,
                text: format!("Avg: {}", fmt(stats.average)),
                anchor: Point::new(rect.left, rect.top - AVG_LABEL_LIFT_CELLS * unit_scale.1),
                color: REGION_COLOR,
            },
            OverlayLabel {
                kind: LabelKind::Max,
                text: fmt(stats.max),
                anchor: Point::new(hot.x, hot.y + SPOT_LABEL_DROP_CELLS * unit_scale.1),
                color: HOT_SPOT_COLOR,
            },
            OverlayLabel {
                kind: LabelKind::Min,
                text: fmt(stats.min),
                anchor: Point::new(cold.x, cold.y + SPOT_LABEL_DROP_CELLS * unit_scale.1),
                color: COLD_SPOT_COLOR,
            },
        ];

        Self {
            region: rect,
            stroke,
            hot_marker: SpotMarker {
                center: hot,
                radius,
                color: HOT_SPOT_COLOR,
            },
            cold_marker: SpotMarker {
                center: cold,
                radius,
                color: COLD_SPOT_COLOR,
            },
            labels,
            stats,
            unit,
        }
    }

    /// Label of the given kind.
    pub fn label(&self, kind: LabelKind) -> Option<&OverlayLabel> {
        self.labels.iter().find(|l| l.kind == kind)
    }

    /// Paints outline and markers onto `image`.
    pub fn draw(&self, image: &mut RgbImage) {
        draw_outline(image, self.region, self.stroke, REGION_COLOR);
        for marker in [&self.hot_marker, &self.cold_marker] {
            draw_filled_circle_mut(
                image,
                (marker.center.x.round() as i32, marker.center.y.round() as i32),
                marker.radius.round() as i32,
                marker.color,
            );
        }
    }
}

/// Draws a rectangle outline `stroke` pixels thick, growing inward.
/// Parts outside the image are clipped; a rectangle covering no pixel
/// draws nothing.
pub fn draw_outline(image: &mut RgbImage, rect: DisplayRect, stroke: u32, color: Rgb<u8>) {
    let bounds = Dimensions::new(image.width(), image.height());
    let Some((left, top, width, height)) = rect.clamp_to(bounds).to_pixels() else {
        return;
    };
    for inset in 0..stroke {
        let Some(w) = width.checked_sub(2 * inset).filter(|w| *w > 0) else {
            break;
        };
        let Some(h) = height.checked_sub(2 * inset).filter(|h| *h > 0) else {
            break;
        };
        let offset = inset as i32;
        draw_hollow_rect_mut(image, Rect::at(left + offset, top + offset).of_size(w, h), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CoordinateMapper;

    fn stats() -> RegionStats {
        RegionStats {
            min: 293.15,
            max: 310.15,
            average: 300.0,
            hot_spot: (12, 10),
            cold_spot: (5, 5),
            count: 100,
        }
    }

    fn mapper() -> CoordinateMapper {
        CoordinateMapper::new(Dimensions::new(20, 20), Dimensions::new(80, 80)).unwrap()
    }

    #[test]
    fn test_build_maps_geometry() {
        let region = MeasurementRegion::new(5, 5, 10, 10);
        let overlay =
            MeasurementOverlay::build(stats(), &region, &mapper(), TemperatureUnit::Celsius);

        assert_eq!(overlay.region, DisplayRect::new(20.0, 20.0, 40.0, 40.0));
        assert_eq!(overlay.hot_marker.center, Point::new(50.0, 42.0));
        assert_eq!(overlay.cold_marker.center, Point::new(22.0, 22.0));
        assert_eq!(overlay.stroke, 2);
    }

    #[test]
    fn test_labels_in_unit() {
        let region = MeasurementRegion::new(5, 5, 10, 10);
        let overlay =
            MeasurementOverlay::build(stats(), &region, &mapper(), TemperatureUnit::Celsius);

        assert_eq!(overlay.label(LabelKind::Max).unwrap().text, "37 C");
        assert_eq!(overlay.label(LabelKind::Min).unwrap().text, "20 C");
        let avg = overlay.label(LabelKind::Average).unwrap();
        assert_eq!(avg.text, "Avg: 26.85 C");
        assert!(avg.anchor.y < overlay.region.top);
    }

    #[test]
    fn test_draw_colors() {
        let region = MeasurementRegion::new(5, 5, 10, 10);
        let overlay =
            MeasurementOverlay::build(stats(), &region, &mapper(), TemperatureUnit::Kelvin);
        let mut image = RgbImage::new(80, 80);
        overlay.draw(&mut image);

        assert_eq!(*image.get_pixel(30, 20), REGION_COLOR);
        assert_eq!(*image.get_pixel(50, 42), HOT_SPOT_COLOR);
        assert_eq!(*image.get_pixel(22, 22), COLD_SPOT_COLOR);
        assert_eq!(*image.get_pixel(40, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_outline_clipped() {
        let mut image = RgbImage::new(10, 10);
        draw_outline(&mut image, DisplayRect::new(-5.0, -5.0, 100.0, 100.0), 1, FACE_COLOR);
        assert_eq!(*image.get_pixel(0, 0), FACE_COLOR);
        assert_eq!(*image.get_pixel(9, 9), FACE_COLOR);

        let mut untouched = RgbImage::new(10, 10);
        draw_outline(&mut untouched, DisplayRect::new(20.0, 20.0, 5.0, 5.0), 1, FACE_COLOR);
        assert!(untouched.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
