//! Prometheus metrics for the frame pipeline.
//!
//! # Metrics Exposed
//!
//! ## Frame flow
//! - `thermal_pipeline_frames_processed_total` - Frames composited
//! - `thermal_pipeline_frames_dropped_total` - Bundles dropped at a full buffer
//! - `thermal_pipeline_overlay_failures_total` - Frames delivered without overlay
//! - `thermal_pipeline_buffer_depth` - Current hand-off buffer length
//!
//! ## Face detection
//! - `thermal_pipeline_detections_submitted_total`
//! - `thermal_pipeline_detections_attached_total`
//! - `thermal_pipeline_detections_discarded_total`
//!
//! ## Measurement log
//! - `thermal_pipeline_log_flushes_total`
//! - `thermal_pipeline_log_flush_failures_total`
//!
//! ## Region statistics (Kelvin)
//! - `thermal_pipeline_region_min_kelvin`
//! - `thermal_pipeline_region_max_kelvin`
//! - `thermal_pipeline_region_average_kelvin`
//!
//! The HTTP exporter is behind the `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsSnapshot, PipelineMetrics};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
