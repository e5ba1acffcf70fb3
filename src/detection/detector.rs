//! Face detector interface.

use crate::geometry::DisplayRect;
use image::RgbImage;
use thiserror::Error;

/// One face found in a visual image, in that image's pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedFace {
    /// Face box in image pixels.
    pub rect: DisplayRect,
    /// Detector score in [0, 1].
    pub confidence: f32,
}

/// Errors a detector backend may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    /// The backend reported an error.
    #[error("detector backend failed: {0}")]
    Backend(String),
    /// The image cannot be searched.
    #[error("image cannot be processed: {0}")]
    InvalidImage(String),
}

/// Finds faces in visual images.
///
/// Implementations run on a detection thread, never on the capture
/// thread, and may take as long as they need.
pub trait FaceDetector: Send + Sync {
    /// Returns every face found in `image`.
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedFace>, DetectionError>;
}
