//! Capture-to-display hand-off.

mod buffer;

pub use buffer::{
    AttachOutcome, BufferConfig, FaceTarget, FrameHandoffBuffer, PushOutcome, DEFAULT_CAPACITY,
    DEFAULT_PUSH_TIMEOUT,
};
