//! Per-frame compositing: calibrate, render, measure, draw.

use super::{FrameBundle, FrameRenderer, MeasurementOverlay, RenderError};
use crate::analysis::{measure_region, RegionError, RegionStats};
use crate::calibration::{CalibrationParams, Calibrator};
use crate::capture::{TemperatureUnit, ThermalFrame, VisualFrame};
use crate::geometry::{CoordinateMapper, Dimensions, MappingError, MeasurementRegion};
use image::RgbImage;
use std::sync::Arc;
use thiserror::Error;

/// Why a frame was delivered without its measurement overlay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// The region could not be measured.
    #[error(transparent)]
    Region(#[from] RegionError),
    /// No mapping between sensor and display.
    #[error(transparent)]
    Mapping(#[from] MappingError),
    /// The base image could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Settings resolved for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    /// Region to measure.
    pub region: MeasurementRegion,
    /// Calibration to apply.
    pub calibration: CalibrationParams,
    /// Presentation unit.
    pub unit: TemperatureUnit,
}

/// Result of compositing one frame.
#[derive(Debug)]
pub struct Composite {
    /// The finished bundle.
    pub bundle: FrameBundle,
    /// Region statistics, `None` when the region could not be measured.
    pub stats: Option<RegionStats>,
    /// The calibrated frame, shared with the face stage.
    pub frame: Arc<ThermalFrame>,
    /// Why the overlay is missing, if it is.
    pub overlay_error: Option<OverlayError>,
}

/// Turns sensor captures into display bundles.
pub struct FrameCompositor {
    calibrator: Arc<dyn Calibrator>,
    renderer: Arc<dyn FrameRenderer>,
    display: Dimensions,
}

impl FrameCompositor {
    /// Creates a compositor for a fixed display size.
    pub fn new(
        calibrator: Arc<dyn Calibrator>,
        renderer: Arc<dyn FrameRenderer>,
        display: Dimensions,
    ) -> Self {
        Self {
            calibrator,
            renderer,
            display,
        }
    }

    /// Display size bundles are rendered at.
    #[inline]
    pub fn display(&self) -> Dimensions {
        self.display
    }

    /// Composites one frame.
    ///
    /// Never fails: any overlay problem is logged and recorded in
    /// [`Composite::overlay_error`], and the bundle is delivered with
    /// whatever was produced.
    pub fn process(
        &self,
        frame: ThermalFrame,
        visual: Option<VisualFrame>,
        settings: &FrameSettings,
    ) -> Composite {
        let frame = self
            .calibrator
            .calibrate(frame, &settings.calibration)
            .with_unit(settings.unit);
        let sequence = frame.sequence();
        let mut overlay_error = None;

        let mut base = match self.renderer.render(&frame, self.display) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Render failed, delivering blank frame");
                overlay_error = Some(e.into());
                RgbImage::new(self.display.width.max(1), self.display.height.max(1))
            }
        };

        let measured = self.measure(&frame, settings);
        let (stats, overlay) = match measured {
            Ok((stats, overlay)) => {
                overlay.draw(&mut base);
                (Some(stats), Some(overlay))
            }
            Err(e) => {
                tracing::warn!(
                    sequence,
                    region = %settings.region,
                    error = %e,
                    "Overlay skipped"
                );
                overlay_error.get_or_insert(e);
                (None, None)
            }
        };

        let mut bundle = FrameBundle::new(sequence, frame.capture_time_millis(), base);
        bundle.visual_image = visual.map(VisualFrame::into_image);
        bundle.overlay = overlay;

        tracing::trace!(sequence, has_overlay = bundle.overlay.is_some(), "Frame composited");

        Composite {
            bundle,
            stats,
            frame: Arc::new(frame),
            overlay_error,
        }
    }

    fn measure(
        &self,
        frame: &ThermalFrame,
        settings: &FrameSettings,
    ) -> Result<(RegionStats, MeasurementOverlay), OverlayError> {
        let stats = measure_region(frame, &settings.region)?;
        let mapper = CoordinateMapper::new(
            Dimensions::new(frame.width(), frame.height()),
            self.display,
        )?;
        let overlay = MeasurementOverlay::build(stats, &settings.region, &mapper, settings.unit);
        Ok((stats, overlay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::Passthrough;
    use crate::compositing::GrayscaleRenderer;

    fn compositor() -> FrameCompositor {
        FrameCompositor::new(
            Arc::new(Passthrough),
            Arc::new(GrayscaleRenderer),
            Dimensions::new(40, 40),
        )
    }

    fn settings(region: MeasurementRegion) -> FrameSettings {
        FrameSettings {
            region,
            calibration: CalibrationParams::default(),
            unit: TemperatureUnit::Kelvin,
        }
    }

    fn ramp() -> ThermalFrame {
        let grid = (0..100).map(f64::from).collect();
        ThermalFrame::new(grid, 10, 10, 5).with_sequence(9)
    }

    #[test]
    fn test_process_measures_region() {
        let composite = compositor().process(
            ramp(),
            None,
            &settings(MeasurementRegion::new(0, 0, 10, 10)),
        );

        let stats = composite.stats.unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 99.0);
        assert_eq!(stats.hot_spot, (9, 9));
        assert!(composite.bundle.overlay.is_some());
        assert!(composite.overlay_error.is_none());
        assert_eq!(composite.bundle.sequence, 9);
        assert_eq!(composite.bundle.capture_time_millis, 5);
        assert_eq!(composite.bundle.base_image.dimensions(), (40, 40));
        assert_eq!(composite.frame.unit(), TemperatureUnit::Kelvin);
    }

    #[test]
    fn test_out_of_bounds_region_keeps_frame() {
        let composite = compositor().process(
            ramp(),
            None,
            &settings(MeasurementRegion::new(5, 5, 10, 10)),
        );

        assert!(composite.stats.is_none());
        assert!(composite.bundle.overlay.is_none());
        assert!(matches!(
            composite.overlay_error,
            Some(OverlayError::Region(RegionError::OutOfBounds { .. }))
        ));
        assert_eq!(composite.bundle.base_image.dimensions(), (40, 40));
    }

    #[test]
    fn test_visual_image_carried() {
        let visual = VisualFrame::new(RgbImage::new(64, 48));
        let composite = compositor().process(
            ramp(),
            Some(visual),
            &settings(MeasurementRegion::new(0, 0, 2, 2)),
        );
        assert_eq!(
            composite.bundle.visual_image.map(|i| i.dimensions()),
            Some((64, 48))
        );
    }
}
