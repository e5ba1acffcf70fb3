//! The unit handed from the capture thread to the display.

use super::overlay::{draw_outline, FACE_COLOR};
use super::{LabelKind, MeasurementOverlay, OverlayLabel};
use crate::analysis::RegionStats;
use crate::capture::{round2, TemperatureUnit};
use crate::geometry::{DisplayRect, Point};
use image::RgbImage;

const FACE_STROKE: u32 = 4;
/// Gap in display pixels between the face box and its label baseline.
const FACE_LABEL_LIFT: f64 = 6.0;

/// A detected face resolved into display space.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceOverlay {
    /// Face box in display pixels, clamped to the display.
    pub rect: DisplayRect,
    /// Detector confidence of the chosen face.
    pub confidence: f32,
    /// Statistics over the sensor cells under the face, when measurable.
    pub stats: Option<RegionStats>,
    /// Unit the label is formatted in.
    pub unit: TemperatureUnit,
}

impl FaceOverlay {
    /// Average temperature label, anchored just above the face box.
    pub fn label(&self) -> Option<OverlayLabel> {
        let stats = self.stats?;
        Some(OverlayLabel {
            kind: LabelKind::Average,
            text: format!(
                "Avg: {} {}",
                round2(self.unit.from_kelvin(stats.average)),
                self.unit.symbol()
            ),
            anchor: Point::new(self.rect.left, self.rect.top - FACE_LABEL_LIFT),
            color: FACE_COLOR,
        })
    }
}

/// Face detection state of a bundle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FaceSlot {
    /// No detection was requested for this frame.
    #[default]
    NotRequested,
    /// A detection request for this frame is in flight.
    Pending,
    /// Detection finished. `None` means no face passed the filter.
    Resolved(Option<FaceOverlay>),
}

impl FaceSlot {
    /// Whether detection has finished for this frame.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, FaceSlot::Resolved(_))
    }

    /// The resolved face, if one passed the filter.
    pub fn face(&self) -> Option<&FaceOverlay> {
        match self {
            FaceSlot::Resolved(face) => face.as_ref(),
            _ => None,
        }
    }
}

/// A finished frame: base image with the measurement overlay already
/// painted, the paired visual image and the face slot.
///
/// Moved, never shared: producer to buffer to display.
#[derive(Clone)]
pub struct FrameBundle {
    /// Capture order, starting at zero.
    pub sequence: u64,
    /// Sensor timestamp of the thermal frame.
    pub capture_time_millis: i64,
    /// Rendered thermal image with the measurement overlay painted on.
    pub base_image: RgbImage,
    /// Visual image captured with the thermal frame, if any.
    pub visual_image: Option<RgbImage>,
    /// `None` when the region could not be measured on this frame.
    pub overlay: Option<MeasurementOverlay>,
    /// Face detection state.
    pub face: FaceSlot,
}

impl FrameBundle {
    /// Bundle with no overlay, visual image or face request.
    pub fn new(sequence: u64, capture_time_millis: i64, base_image: RgbImage) -> Self {
        Self {
            sequence,
            capture_time_millis,
            base_image,
            visual_image: None,
            overlay: None,
            face: FaceSlot::NotRequested,
        }
    }

    /// The image to show: base image plus the face box, if one resolved.
    pub fn composited(&self) -> RgbImage {
        let mut image = self.base_image.clone();
        if let Some(face) = self.face.face() {
            draw_outline(&mut image, face.rect, FACE_STROKE, FACE_COLOR);
        }
        image
    }

    /// Every text annotation for this frame: measurement labels, then the
    /// face label.
    pub fn labels(&self) -> Vec<OverlayLabel> {
        self.overlay
            .iter()
            .flat_map(|overlay| overlay.labels.iter().cloned())
            .chain(self.face.face().and_then(FaceOverlay::label))
            .collect()
    }
}

impl std::fmt::Debug for FrameBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBundle")
            .field("sequence", &self.sequence)
            .field("capture_time_millis", &self.capture_time_millis)
            .field("base_image", &self.base_image.dimensions())
            .field("has_visual", &self.visual_image.is_some())
            .field("has_overlay", &self.overlay.is_some())
            .field("face", &self.face)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_composited_draws_resolved_face() {
        let mut bundle = FrameBundle::new(1, 0, RgbImage::new(40, 40));
        assert_eq!(bundle.composited(), bundle.base_image);

        bundle.face = FaceSlot::Resolved(Some(FaceOverlay {
            rect: DisplayRect::new(10.0, 10.0, 20.0, 20.0),
            confidence: 0.9,
            stats: None,
            unit: TemperatureUnit::Celsius,
        }));
        let image = bundle.composited();
        assert_eq!(*image.get_pixel(10, 15), FACE_COLOR);
        assert_eq!(*image.get_pixel(13, 15), FACE_COLOR);
        assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
        // Base image is left untouched.
        assert_eq!(*bundle.base_image.get_pixel(10, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_face_label() {
        let face = FaceOverlay {
            rect: DisplayRect::new(10.0, 20.0, 30.0, 30.0),
            confidence: 0.7,
            stats: Some(RegionStats {
                min: 300.0,
                max: 310.0,
                average: 309.15,
                hot_spot: (0, 0),
                cold_spot: (0, 0),
                count: 4,
            }),
            unit: TemperatureUnit::Celsius,
        };
        let label = face.label().unwrap();
        assert_eq!(label.text, "Avg: 36 C");
        assert_eq!(label.kind, LabelKind::Average);
        assert_eq!(label.color, FACE_COLOR);
        assert_eq!(label.anchor, Point::new(10.0, 14.0));

        let unmeasured = FaceOverlay {
            stats: None,
            ..face
        };
        assert!(unmeasured.label().is_none());
    }

    #[test]
    fn test_bundle_labels_include_face() {
        let mut bundle = FrameBundle::new(1, 0, RgbImage::new(40, 40));
        assert!(bundle.labels().is_empty());

        bundle.face = FaceSlot::Resolved(Some(FaceOverlay {
            rect: DisplayRect::new(10.0, 10.0, 20.0, 20.0),
            confidence: 0.9,
            stats: Some(RegionStats {
                min: 300.0,
                max: 300.0,
                average: 300.0,
                hot_spot: (0, 0),
                cold_spot: (0, 0),
                count: 1,
            }),
            unit: TemperatureUnit::Kelvin,
        }));
        let labels = bundle.labels();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].text, "Avg: 300 K");
        assert_eq!(labels[0].anchor.y, 4.0);
    }

    #[test]
    fn test_slot_accessors() {
        assert!(!FaceSlot::Pending.is_resolved());
        assert!(FaceSlot::Resolved(None).is_resolved());
        assert!(FaceSlot::Resolved(None).face().is_none());
    }
}
