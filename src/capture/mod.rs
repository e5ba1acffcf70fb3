//! Sensor input and frame handling.
//!
//! This module provides the sensor-source abstraction the pipeline
//! subscribes to, the frame types it hands over, and the built-in
//! emulator used when no camera is attached.

mod config;
mod emulator;
mod frame;
mod source;
mod units;

pub use config::{ConfigError, SensorConfig};
pub use emulator::{EmulatedSensor, FrameSynthesizer};
pub use frame::{SensorCapture, ThermalFrame, VisualFrame};
pub use source::{FrameCallback, MockSensor, SensorError, SensorSource, SensorTrigger};
pub use units::{round2, TemperatureUnit};
