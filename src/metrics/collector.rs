//! Pipeline metrics registry.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Cumulative pipeline state, as read from its components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Frames handled by the capture callback.
    pub frames_processed: u64,
    /// Bundles dropped at the hand-off buffer.
    pub frames_dropped: u64,
    /// Frames delivered without an overlay.
    pub overlay_failures: u64,
    /// Bundles waiting for the display.
    pub buffer_depth: usize,
    /// Face detections started.
    pub detections_submitted: u64,
    /// Face results attached to a bundle.
    pub detections_attached: u64,
    /// Face results discarded.
    pub detections_discarded: u64,
    /// Log windows written.
    pub log_flushes: u64,
    /// Log windows the sink rejected.
    pub log_flush_failures: u64,
    /// Latest region statistics in Kelvin, when the last frame had them.
    pub region_min: Option<f64>,
    /// Latest region maximum in Kelvin.
    pub region_max: Option<f64>,
    /// Latest region average in Kelvin.
    pub region_average: Option<f64>,
}

/// Prometheus metrics for the frame pipeline.
pub struct PipelineMetrics {
    registry: Registry,

    // Frame flow
    frames_processed: IntCounter,
    frames_dropped: IntCounter,
    overlay_failures: IntCounter,
    buffer_depth: IntGauge,

    // Face detection
    detections_submitted: IntCounter,
    detections_attached: IntCounter,
    detections_discarded: IntCounter,

    // Measurement log
    log_flushes: IntCounter,
    log_flush_failures: IntCounter,

    // Latest region statistics
    region_min: Gauge,
    region_max: Gauge,
    region_average: Gauge,
}

impl PipelineMetrics {
    /// Creates a registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_processed = IntCounter::new(
            "thermal_pipeline_frames_processed_total",
            "Frames composited by the capture callback",
        )?;
        let frames_dropped = IntCounter::new(
            "thermal_pipeline_frames_dropped_total",
            "Bundles dropped because the hand-off buffer stayed full",
        )?;
        let overlay_failures = IntCounter::new(
            "thermal_pipeline_overlay_failures_total",
            "Frames delivered without a measurement overlay",
        )?;
        let buffer_depth = IntGauge::new(
            "thermal_pipeline_buffer_depth",
            "Bundles waiting in the hand-off buffer",
        )?;

        let detections_submitted = IntCounter::new(
            "thermal_pipeline_detections_submitted_total",
            "Face detection requests started",
        )?;
        let detections_attached = IntCounter::new(
            "thermal_pipeline_detections_attached_total",
            "Face results attached to a buffered bundle",
        )?;
        let detections_discarded = IntCounter::new(
            "thermal_pipeline_detections_discarded_total",
            "Face results discarded (no matching bundle or after shutdown)",
        )?;

        let log_flushes = IntCounter::new(
            "thermal_pipeline_log_flushes_total",
            "Log windows written to the sink",
        )?;
        let log_flush_failures = IntCounter::new(
            "thermal_pipeline_log_flush_failures_total",
            "Log windows the sink rejected",
        )?;

        let region_min = Gauge::new(
            "thermal_pipeline_region_min_kelvin",
            "Minimum temperature in the measurement region",
        )?;
        let region_max = Gauge::new(
            "thermal_pipeline_region_max_kelvin",
            "Maximum temperature in the measurement region",
        )?;
        let region_average = Gauge::new(
            "thermal_pipeline_region_average_kelvin",
            "Average temperature in the measurement region",
        )?;

        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(frames_dropped.clone()))?;
        registry.register(Box::new(overlay_failures.clone()))?;
        registry.register(Box::new(buffer_depth.clone()))?;
        registry.register(Box::new(detections_submitted.clone()))?;
        registry.register(Box::new(detections_attached.clone()))?;
        registry.register(Box::new(detections_discarded.clone()))?;
        registry.register(Box::new(log_flushes.clone()))?;
        registry.register(Box::new(log_flush_failures.clone()))?;
        registry.register(Box::new(region_min.clone()))?;
        registry.register(Box::new(region_max.clone()))?;
        registry.register(Box::new(region_average.clone()))?;

        Ok(Self {
            registry,
            frames_processed,
            frames_dropped,
            overlay_failures,
            buffer_depth,
            detections_submitted,
            detections_attached,
            detections_discarded,
            log_flushes,
            log_flush_failures,
            region_min,
            region_max,
            region_average,
        })
    }

    /// Brings all metrics up to date with a snapshot.
    ///
    /// Counters only move forward; a snapshot with smaller totals (after
    /// a pipeline restart) leaves them where they are.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        advance(&self.frames_processed, snapshot.frames_processed);
        advance(&self.frames_dropped, snapshot.frames_dropped);
        advance(&self.overlay_failures, snapshot.overlay_failures);
        self.buffer_depth.set(snapshot.buffer_depth as i64);

        advance(&self.detections_submitted, snapshot.detections_submitted);
        advance(&self.detections_attached, snapshot.detections_attached);
        advance(&self.detections_discarded, snapshot.detections_discarded);

        advance(&self.log_flushes, snapshot.log_flushes);
        advance(&self.log_flush_failures, snapshot.log_flush_failures);

        if let Some(min) = snapshot.region_min {
            self.region_min.set(min);
        }
        if let Some(max) = snapshot.region_max {
            self.region_max.set(max);
        }
        if let Some(avg) = snapshot.region_average {
            self.region_average.set(avg);
        }
    }

    /// Frames processed so far.
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.get()
    }

    /// Bundles dropped so far.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
