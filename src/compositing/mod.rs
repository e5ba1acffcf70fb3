//! Frame compositing.
//!
//! Every capture becomes a [`FrameBundle`]: a rendered base image with
//! the measurement overlay painted on, the paired visual image, and a
//! face slot the detection stage may fill in later.

mod bundle;
mod compositor;
mod overlay;
mod render;

pub use bundle::{FaceOverlay, FaceSlot, FrameBundle};
pub use compositor::{Composite, FrameCompositor, FrameSettings, OverlayError};
pub use overlay::{
    draw_outline, LabelKind, MeasurementOverlay, OverlayLabel, SpotMarker, COLD_SPOT_COLOR,
    FACE_COLOR, HOT_SPOT_COLOR, REGION_COLOR,
};
pub use render::{FrameRenderer, GrayscaleRenderer, RenderError};
