//! Calibration of thermal frames.
//!
//! Parameters are read-only from the pipeline's point of view; they are
//! replaced wholesale through the settings handle and applied to each
//! frame before any statistic is computed.

mod correction;
mod params;

pub use correction::{Calibrator, EmissivityCorrection, Passthrough};
pub use params::{CalibrationError, CalibrationParams, DistanceUnit};
