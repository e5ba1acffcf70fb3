//! Camera pipeline: lifecycle, settings and the display loop.

mod camera_pipeline;
mod display;
mod settings;

pub use camera_pipeline::{CameraPipeline, PipelineBuilder, PipelineConfig, PipelineError};
pub use display::{
    DisplayConfig, DisplayLoop, DisplaySink, LatestFrameDisplay, RecordingDisplay, TickHook,
};
pub use settings::{PipelineSettings, SettingsHandle};
