//! Face detection and overlay correlation.

mod detector;
mod skin;
mod stage;

pub use detector::{DetectedFace, DetectionError, FaceDetector};
pub use skin::SkinToneDetector;
pub use stage::{
    resolve_face, CorrelationPolicy, DetectionRequest, DetectionTicket, FaceOverlayStage,
    FaceStageConfig, FaceStageCounters, DEFAULT_MIN_CONFIDENCE,
};
