//! Thermal Camera Frame Pipeline
//!
//! Ingests a stream of thermal-sensor frames, measures a user-positioned
//! region on each one, optionally finds faces in the paired visual image,
//! and hands finished frames to a display at the display's own cadence.
//!
//! # Architecture
//!
//! ```text
//! capture → calibration → compositing → handoff → display
//!                             ↓     ↑
//!                   analysis, logging   detection (async)
//! ```
//!
//! - [`analysis`]: region extraction and single-pass statistics
//! - [`geometry`]: measurement region and sensor ↔ display mapping
//! - [`handoff`]: the bounded buffer between capture and display threads
//! - [`logging`]: windowed measurement log and its sinks
//! - [`pipeline`]: orchestration and lifecycle
//!
//! # Design Principles
//!
//! - **Capture never waits**: every step on the sensor thread is bounded
//! - **Fail soft per frame**: a bad region loses its overlay, not the frame
//! - **Kelvin inside**: units are converted only for presentation
//! - **Injected collaborators**: sensor, calibrator, detector, display
//!   and log sink are traits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use thermal_pipeline::{
//!     capture::{EmulatedSensor, SensorConfig},
//!     detection::SkinToneDetector,
//!     logging::FileLogSink,
//!     pipeline::{CameraPipeline, PipelineConfig, RecordingDisplay},
//! };
//!
//! let sensor = EmulatedSensor::new(SensorConfig::default()).unwrap();
//! let mut pipeline = CameraPipeline::builder(PipelineConfig::default(), Box::new(sensor))
//!     .detector(Arc::new(SkinToneDetector::default()))
//!     .display(Arc::new(RecordingDisplay::new()))
//!     .log_sink(Arc::new(FileLogSink::new("logs")))
//!     .build()
//!     .unwrap();
//!
//! pipeline.start().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! pipeline.stop();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod calibration;
pub mod capture;
pub mod compositing;
pub mod config;
pub mod detection;
pub mod geometry;
pub mod handoff;
pub mod logging;
pub mod metrics;
pub mod pipeline;

// Re-export commonly used types at crate root
pub use analysis::{compute_stats, RegionStats};
pub use capture::{SensorCapture, SensorSource, TemperatureUnit, ThermalFrame, VisualFrame};
pub use compositing::{FaceSlot, FrameBundle};
pub use config::FileConfig;
pub use geometry::{CoordinateMapper, MeasurementRegion};
pub use handoff::{FrameHandoffBuffer, PushOutcome};
pub use logging::{LogAggregator, LogSink};
pub use pipeline::{CameraPipeline, PipelineConfig, SettingsHandle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
