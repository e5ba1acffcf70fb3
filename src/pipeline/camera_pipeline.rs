//! Pipeline orchestration.
//!
//! ```text
//! sensor callback ─▶ compositor ─▶ log ─▶ hand-off buffer ─▶ display loop ─▶ sink
//!                                          ▲
//!                       face stage ────────┘ (async attach)
//! ```
//!
//! Everything on the capture thread is bounded: compositing is pure
//! computation, log flushes go through the sink (a background writer in
//! production), the buffer push waits at most its timeout, and face
//! detection only ever claims a slot and spawns.

use super::display::{DisplayConfig, DisplayLoop, DisplaySink};
use super::settings::{PipelineSettings, SettingsHandle};
use crate::analysis::RegionStats;
use crate::calibration::{CalibrationError, Calibrator, EmissivityCorrection};
use crate::capture::{SensorCapture, SensorError, SensorSource};
use crate::compositing::{FaceSlot, FrameCompositor, FrameRenderer, GrayscaleRenderer};
use crate::detection::{DetectionRequest, FaceDetector, FaceOverlayStage, FaceStageConfig};
use crate::geometry::Dimensions;
use crate::handoff::{BufferConfig, FrameHandoffBuffer, PushOutcome};
use crate::logging::{FlushOutcome, LogAggregator, LogSink, LogSinkError};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Pipeline errors. Per-frame problems never surface here; they are
/// handled at the frame boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start` was called on a running pipeline.
    #[error("pipeline is already running")]
    AlreadyRunning,
    /// A required collaborator was not supplied.
    #[error("missing pipeline component: {0}")]
    MissingComponent(&'static str),
    /// The display has a zero dimension.
    #[error("invalid display dimensions {0}x{1}")]
    InvalidDisplay(u32, u32),
    /// The sensor failed.
    #[error(transparent)]
    Sensor(#[from] SensorError),
    /// Initial calibration is invalid.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    /// The log sink failed.
    #[error(transparent)]
    Log(#[from] LogSinkError),
    /// A worker thread could not be spawned.
    #[error("failed to start thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Static pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Display size and refresh rate.
    pub display: DisplayConfig,
    /// Hand-off buffer sizing.
    pub buffer: BufferConfig,
    /// Face stage settings.
    pub faces: FaceStageConfig,
    /// Length of a log window.
    pub log_window: Duration,
    /// Settings the pipeline starts with.
    pub initial: PipelineSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            buffer: BufferConfig::default(),
            faces: FaceStageConfig::default(),
            log_window: Duration::from_secs(15),
            initial: PipelineSettings::default(),
        }
    }
}

#[derive(Default)]
struct FrameCounters {
    next_sequence: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    overlay_failures: AtomicU64,
}

/// Work done on the capture thread for each capture.
struct FrameProcessor {
    compositor: FrameCompositor,
    buffer: Arc<FrameHandoffBuffer>,
    faces: Option<FaceOverlayStage>,
    log: Arc<LogAggregator>,
    settings: SettingsHandle,
    counters: FrameCounters,
    latest_stats: Mutex<Option<RegionStats>>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl FrameProcessor {
    fn handle(&self, capture: SensorCapture) {
        let SensorCapture { thermal, visual } = capture;
        let sequence = self.counters.next_sequence.fetch_add(1, Ordering::Relaxed);
        let thermal = thermal.with_sequence(sequence);
        let capture_time = thermal.capture_time_millis();
        let frame_settings = self
            .settings
            .frame_settings(Dimensions::new(thermal.width(), thermal.height()));

        // Claim the detection slot before the visual image moves into the bundle.
        let detection = visual.as_ref().and_then(|v| {
            let faces = self.faces.as_ref()?;
            let ticket = faces.try_acquire()?;
            Some((faces, ticket, v.image().clone()))
        });

        let composite = self.compositor.process(thermal, visual, &frame_settings);
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        if composite.overlay_error.is_some() {
            self.counters.overlay_failures.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(stats) = composite.stats {
            let outcome = self
                .log
                .record(capture_time, stats.summary(frame_settings.unit));
            if outcome == Some(FlushOutcome::Failed) {
                tracing::warn!(sequence, "Measurement log window lost");
            }
        }
        *self
            .latest_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = composite.stats;

        let mut bundle = composite.bundle;
        if detection.is_some() {
            bundle.face = FaceSlot::Pending;
        }

        match self.buffer.push(bundle) {
            PushOutcome::Queued { depth } => {
                tracing::trace!(sequence, depth, "Bundle queued");
                if let Some((faces, ticket, image)) = detection {
                    faces.submit(
                        ticket,
                        DetectionRequest {
                            sequence,
                            visual: image,
                            frame: composite.frame,
                            unit: frame_settings.unit,
                        },
                    );
                }
            }
            PushOutcome::Dropped | PushOutcome::Closed => {
                // Dropping the ticket with the bundle frees the detection slot.
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.update(&self.snapshot());
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let faces = self
            .faces
            .as_ref()
            .map(FaceOverlayStage::counters)
            .unwrap_or_default();
        let stats = *self
            .latest_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        MetricsSnapshot {
            frames_processed: self.counters.processed.load(Ordering::Relaxed),
            frames_dropped: self.counters.dropped.load(Ordering::Relaxed),
            overlay_failures: self.counters.overlay_failures.load(Ordering::Relaxed),
            buffer_depth: self.buffer.len(),
            detections_submitted: faces.submitted,
            detections_attached: faces.attached,
            detections_discarded: faces.discarded,
            log_flushes: self.log.flush_count(),
            log_flush_failures: self.log.failure_count(),
            region_min: stats.map(|s| s.min),
            region_max: stats.map(|s| s.max),
            region_average: stats.map(|s| s.average),
        }
    }
}

/// Assembles a [`CameraPipeline`] from its collaborators.
pub struct PipelineBuilder {
    config: PipelineConfig,
    source: Box<dyn SensorSource>,
    calibrator: Arc<dyn Calibrator>,
    renderer: Arc<dyn FrameRenderer>,
    detector: Option<Arc<dyn FaceDetector>>,
    display: Option<Arc<dyn DisplaySink>>,
    log_sink: Option<Arc<dyn LogSink>>,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl PipelineBuilder {
    /// Calibrator applied to every frame.
    pub fn calibrator(mut self, calibrator: Arc<dyn Calibrator>) -> Self {
        self.calibrator = calibrator;
        self
    }

    /// Renderer for base images.
    pub fn renderer(mut self, renderer: Arc<dyn FrameRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Enables face detection with `detector`.
    pub fn detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Receiver of finished bundles.
    pub fn display(mut self, display: Arc<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    /// Destination of log windows.
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Shares an existing metrics registry.
    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the configuration and assembles the pipeline.
    pub fn build(self) -> Result<CameraPipeline, PipelineError> {
        let display_sink = self.display.ok_or(PipelineError::MissingComponent("display"))?;
        let log_sink = self.log_sink.ok_or(PipelineError::MissingComponent("log sink"))?;
        let display_cfg = self.config.display;
        let display = Dimensions::new(display_cfg.width, display_cfg.height);
        if display.is_empty() {
            return Err(PipelineError::InvalidDisplay(display.width, display.height));
        }
        self.config.initial.calibration.validate()?;

        let buffer = Arc::new(FrameHandoffBuffer::from_config(&self.config.buffer));
        let faces = self.detector.map(|detector| {
            FaceOverlayStage::new(detector, Arc::clone(&buffer), self.config.faces, display)
        });
        let log = Arc::new(LogAggregator::new(self.config.log_window, log_sink));
        let settings = SettingsHandle::new(self.config.initial);

        let processor = Arc::new(FrameProcessor {
            compositor: FrameCompositor::new(self.calibrator, self.renderer, display),
            buffer,
            faces,
            log,
            settings: settings.clone(),
            counters: FrameCounters::default(),
            latest_stats: Mutex::new(None),
            metrics: self.metrics,
        });

        Ok(CameraPipeline {
            config: self.config,
            source: self.source,
            display_sink,
            processor,
            settings,
            display_loop: None,
            running: false,
        })
    }
}

/// Streams sensor captures through compositing, logging and face
/// detection to a display.
pub struct CameraPipeline {
    config: PipelineConfig,
    source: Box<dyn SensorSource>,
    display_sink: Arc<dyn DisplaySink>,
    processor: Arc<FrameProcessor>,
    settings: SettingsHandle,
    display_loop: Option<DisplayLoop>,
    running: bool,
}

impl CameraPipeline {
    /// Starts a builder with the default calibrator and renderer.
    pub fn builder(config: PipelineConfig, source: Box<dyn SensorSource>) -> PipelineBuilder {
        PipelineBuilder {
            config,
            source,
            calibrator: Arc::new(EmissivityCorrection),
            renderer: Arc::new(GrayscaleRenderer),
            detector: None,
            display: None,
            log_sink: None,
            metrics: None,
        }
    }

    /// Subscribes to the sensor and starts the display loop.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.running {
            return Err(PipelineError::AlreadyRunning);
        }

        self.processor.buffer.reopen();
        if let Some(faces) = &self.processor.faces {
            faces.resume();
        }

        if self.config.display.refresh_hz > 0 {
            let log = Arc::clone(&self.processor.log);
            let on_tick = Box::new(move || {
                log.flush_if_due(chrono::Utc::now().timestamp_millis());
            });
            self.display_loop = Some(DisplayLoop::spawn(
                Arc::clone(&self.processor.buffer),
                Arc::clone(&self.display_sink),
                self.config.display.refresh_hz,
                on_tick,
            )?);
        }

        let processor = Arc::clone(&self.processor);
        if let Err(e) = self
            .source
            .subscribe(Box::new(move |capture| processor.handle(capture)))
        {
            if let Some(mut display_loop) = self.display_loop.take() {
                display_loop.stop();
            }
            return Err(e.into());
        }

        self.running = true;
        tracing::info!(
            display_width = self.config.display.width,
            display_height = self.config.display.height,
            faces = self.processor.faces.is_some(),
            "Pipeline started"
        );
        Ok(())
    }

    /// Stops streaming: no callback runs after this returns, pending
    /// face results are discarded, and the open log window is written
    /// out and cleared.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.source.unsubscribe();

        if let Some(faces) = &self.processor.faces {
            faces.shutdown();
        }

        let log = &self.processor.log;
        log.flush_now(chrono::Utc::now().timestamp_millis());
        log.reset_log();

        if let Some(mut display_loop) = self.display_loop.take() {
            display_loop.stop();
        }
        self.processor.buffer.close();

        self.running = false;
        let snapshot = self.processor.snapshot();
        tracing::info!(
            processed = snapshot.frames_processed,
            dropped = snapshot.frames_dropped,
            overlay_failures = snapshot.overlay_failures,
            "Pipeline stopped"
        );
    }

    /// Whether the pipeline is streaming.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handle for region, calibration and unit changes.
    pub fn settings(&self) -> SettingsHandle {
        self.settings.clone()
    }

    /// The hand-off buffer. Drain it directly when the display loop is disabled.
    pub fn buffer(&self) -> Arc<FrameHandoffBuffer> {
        Arc::clone(&self.processor.buffer)
    }

    /// The measurement log.
    pub fn log(&self) -> Arc<LogAggregator> {
        Arc::clone(&self.processor.log)
    }

    /// Writes the open log window as a one-off snapshot.
    pub fn export_log_snapshot(&self) -> Result<(), PipelineError> {
        self.processor
            .log
            .export_snapshot(chrono::Utc::now().timestamp_millis())?;
        Ok(())
    }

    /// Discards the open log window without writing it.
    pub fn reset_log(&self) {
        self.processor.log.reset_log();
    }

    /// Latest region statistics.
    pub fn latest_stats(&self) -> Option<RegionStats> {
        *self
            .processor
            .latest_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current counters and latest statistics.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.processor.snapshot()
    }

    /// Waits for an in-flight face detection to finish.
    pub fn wait_for_faces(&self, timeout: Duration) -> bool {
        self.processor
            .faces
            .as_ref()
            .map_or(true, |faces| faces.wait_idle(timeout))
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
