//! Asynchronous face overlay stage.
//!
//! At most one detection runs at a time, on its own short-lived thread.
//! The capture thread claims the slot with [`FaceOverlayStage::try_acquire`];
//! when the slot is taken the frame simply goes out without a face
//! request. Finished results are correlated back to a buffered bundle
//! according to the configured [`CorrelationPolicy`].

use super::{DetectedFace, FaceDetector};
use crate::analysis::measure_region;
use crate::capture::{TemperatureUnit, ThermalFrame};
use crate::compositing::FaceOverlay;
use crate::geometry::{ChainedMapper, CoordinateMapper, Dimensions, Mapping, MeasurementRegion};
use crate::handoff::{AttachOutcome, FaceTarget, FrameHandoffBuffer};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default confidence below which detections are ignored.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.51;

/// How a detection result finds its bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationPolicy {
    /// Oldest buffered bundle whose face slot is unresolved.
    #[default]
    Fifo,
    /// Only the bundle the request was made for; dropped if already displayed.
    Exact,
}

/// Face stage configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceStageConfig {
    /// Detections below this confidence are ignored.
    pub min_confidence: f32,
    /// How results are matched to buffered bundles.
    pub policy: CorrelationPolicy,
}

impl Default for FaceStageConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            policy: CorrelationPolicy::Fifo,
        }
    }
}

/// Counters for the face stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceStageCounters {
    /// Detections started.
    pub submitted: u64,
    /// Results written into a buffered bundle.
    pub attached: u64,
    /// Results dropped: stale or without a matching bundle.
    pub discarded: u64,
}

#[derive(Default)]
struct StageShared {
    in_flight: AtomicBool,
    accepting: AtomicBool,
    generation: AtomicU64,
    submitted: AtomicU64,
    attached: AtomicU64,
    discarded: AtomicU64,
}

/// Exclusive right to run the next detection.
///
/// Dropping an unused ticket frees the slot again.
pub struct DetectionTicket {
    shared: Arc<StageShared>,
}

impl Drop for DetectionTicket {
    fn drop(&mut self) {
        self.shared.in_flight.store(false, Ordering::Release);
    }
}

/// Inputs of one detection request.
pub struct DetectionRequest {
    /// Sequence number of the bundle the request was made for.
    pub sequence: u64,
    /// Visual image to search.
    pub visual: RgbImage,
    /// Calibrated thermal frame the visual image was captured with.
    pub frame: Arc<ThermalFrame>,
    /// Unit for the face temperature label.
    pub unit: TemperatureUnit,
}

/// Runs face detection off the capture thread and attaches results.
pub struct FaceOverlayStage {
    detector: Arc<dyn FaceDetector>,
    buffer: Arc<FrameHandoffBuffer>,
    config: FaceStageConfig,
    display: Dimensions,
    shared: Arc<StageShared>,
}

impl FaceOverlayStage {
    /// Creates an idle stage that accepts submissions.
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        buffer: Arc<FrameHandoffBuffer>,
        config: FaceStageConfig,
        display: Dimensions,
    ) -> Self {
        let shared = Arc::new(StageShared::default());
        shared.accepting.store(true, Ordering::Release);
        Self {
            detector,
            buffer,
            config,
            display,
            shared,
        }
    }

    /// Stage configuration.
    #[inline]
    pub fn config(&self) -> &FaceStageConfig {
        &self.config
    }

    /// Claims the detection slot if the stage is idle and accepting.
    pub fn try_acquire(&self) -> Option<DetectionTicket> {
        if !self.shared.accepting.load(Ordering::Acquire) {
            return None;
        }
        self.shared
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| DetectionTicket {
                shared: Arc::clone(&self.shared),
            })
    }

    /// Starts detection for a bundle that was pushed with a pending face slot.
    pub fn submit(&self, ticket: DetectionTicket, request: DetectionRequest) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        let sequence = request.sequence;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);

        let job = DetectionJob {
            detector: Arc::clone(&self.detector),
            buffer: Arc::clone(&self.buffer),
            shared: Arc::clone(&self.shared),
            config: self.config,
            display: self.display,
            generation,
        };

        let spawned = thread::Builder::new()
            .name(format!("face-detect-{sequence}"))
            .spawn(move || {
                let _ticket = ticket;
                job.run(request);
            });

        if let Err(e) = spawned {
            // The ticket went down with the closure, so the slot is free.
            tracing::warn!(sequence, error = %e, "Could not start face detection");
            self.buffer.attach_face(FaceTarget::Sequence(sequence), None);
        } else {
            tracing::trace!(sequence, generation, "Face detection submitted");
        }
    }

    /// Stops new submissions and invalidates results still in flight.
    ///
    /// The generation is bumped under the buffer lock, so once this
    /// returns no earlier request can attach a result.
    pub fn shutdown(&self) {
        self.shared.accepting.store(false, Ordering::Release);
        let generation = self
            .buffer
            .exclusive(|| self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1);
        tracing::debug!(generation, "Face stage shut down");
    }

    /// Accepts submissions again after [`shutdown`](Self::shutdown).
    pub fn resume(&self) {
        self.shared.accepting.store(true, Ordering::Release);
    }

    /// Whether a detection is running.
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Waits until no detection is running. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }

    /// Current counter values.
    pub fn counters(&self) -> FaceStageCounters {
        FaceStageCounters {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            attached: self.shared.attached.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }
}

struct DetectionJob {
    detector: Arc<dyn FaceDetector>,
    buffer: Arc<FrameHandoffBuffer>,
    shared: Arc<StageShared>,
    config: FaceStageConfig,
    display: Dimensions,
    generation: u64,
}

impl DetectionJob {
    fn run(self, request: DetectionRequest) {
        let sequence = request.sequence;
        let face = match self.detector.detect(&request.visual) {
            Ok(faces) => resolve_face(
                &faces,
                Dimensions::new(request.visual.width(), request.visual.height()),
                &request.frame,
                self.display,
                self.config.min_confidence,
                request.unit,
            ),
            Err(e) => {
                tracing::warn!(sequence, error = %e, "Face detection failed");
                None
            }
        };

        let target = match self.config.policy {
            CorrelationPolicy::Fifo => FaceTarget::OldestUnresolved,
            CorrelationPolicy::Exact => FaceTarget::Sequence(sequence),
        };
        let current = || self.shared.generation.load(Ordering::Acquire) == self.generation;
        match self.buffer.attach_face_if(target, face, current) {
            AttachOutcome::Attached(attached_to) => {
                self.shared.attached.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(sequence, attached_to, "Face result attached");
            }
            AttachOutcome::NoMatch => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    sequence,
                    policy = ?self.config.policy,
                    "Face result had no matching bundle"
                );
            }
            AttachOutcome::Rejected => {
                self.shared.discarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(sequence, "Face result discarded after shutdown");
            }
        }
    }
}

/// Picks the best face above `min_confidence` and resolves it into
/// display space, with statistics over the sensor cells it covers.
pub fn resolve_face(
    faces: &[DetectedFace],
    visual: Dimensions,
    frame: &ThermalFrame,
    display: Dimensions,
    min_confidence: f32,
    unit: TemperatureUnit,
) -> Option<FaceOverlay> {
    let best = faces
        .iter()
        .filter(|f| f.confidence >= min_confidence)
        .fold(None::<&DetectedFace>, |best, f| match best {
            Some(b) if b.confidence >= f.confidence => Some(b),
            _ => Some(f),
        })?;

    let to_display = CoordinateMapper::new(visual, display).ok()?;
    let rect = to_display.rect_to_display(best.rect).clamp_to(display);
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }

    // Sensor grid -> display bitmap -> visual image, walked backwards.
    let sensor = Dimensions::new(frame.width(), frame.height());
    let stats = CoordinateMapper::new(sensor, display)
        .ok()
        .zip(CoordinateMapper::new(display, visual).ok())
        .map(|(thermal, image)| ChainedMapper::new(thermal, image))
        .and_then(|chain| MeasurementRegion::covering(chain.rect_to_sensor(best.rect), sensor))
        .and_then(|region| measure_region(frame, &region).ok());

    Some(FaceOverlay {
        rect,
        confidence: best.confidence,
        stats,
        unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositing::{FaceSlot, FrameBundle};
    use crate::detection::DetectionError;
    use crate::geometry::DisplayRect;
    use std::sync::Mutex;

    struct FixedDetector(Vec<DetectedFace>);

    impl FaceDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectedFace>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    /// Blocks until released, to hold a request in flight.
    struct GatedDetector {
        gate: Mutex<bool>,
    }

    impl FaceDetector for GatedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectedFace>, DetectionError> {
            while !*self.gate.lock().unwrap() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(vec![face(0.9)])
        }
    }

    fn face(confidence: f32) -> DetectedFace {
        DetectedFace {
            rect: DisplayRect::new(40.0, 40.0, 80.0, 80.0),
            confidence,
        }
    }

    fn frame() -> Arc<ThermalFrame> {
        let grid = (0..100).map(f64::from).collect();
        Arc::new(ThermalFrame::new(grid, 10, 10, 0))
    }

    fn request(sequence: u64) -> DetectionRequest {
        DetectionRequest {
            sequence,
            visual: RgbImage::new(200, 200),
            frame: frame(),
            unit: TemperatureUnit::Kelvin,
        }
    }

    fn pending(sequence: u64) -> FrameBundle {
        let mut bundle = FrameBundle::new(sequence, 0, RgbImage::new(1, 1));
        bundle.face = FaceSlot::Pending;
        bundle
    }

    fn stage(
        detector: Arc<dyn FaceDetector>,
        policy: CorrelationPolicy,
    ) -> (FaceOverlayStage, Arc<FrameHandoffBuffer>) {
        let buffer = Arc::new(FrameHandoffBuffer::default());
        let config = FaceStageConfig {
            policy,
            ..Default::default()
        };
        let display = Dimensions::new(100, 100);
        let stage = FaceOverlayStage::new(detector, Arc::clone(&buffer), config, display);
        (stage, buffer)
    }

    #[test]
    fn test_resolve_picks_best_and_maps() {
        let faces = [face(0.6), face(0.95), face(0.3)];
        let overlay = resolve_face(
            &faces,
            Dimensions::new(200, 200),
            &frame(),
            Dimensions::new(100, 100),
            DEFAULT_MIN_CONFIDENCE,
            TemperatureUnit::Kelvin,
        )
        .unwrap();

        assert_eq!(overlay.confidence, 0.95);
        assert_eq!(overlay.rect, DisplayRect::new(20.0, 20.0, 40.0, 40.0));
        // Display 20..60 covers sensor cells 2..6 on both axes.
        let stats = overlay.stats.unwrap();
        assert_eq!(stats.count, 16);
        assert_eq!(stats.cold_spot, (2, 2));
        assert_eq!(stats.hot_spot, (5, 5));
    }

    #[test]
    fn test_resolve_filters_low_confidence() {
        let faces = [face(0.5)];
        let overlay = resolve_face(
            &faces,
            Dimensions::new(200, 200),
            &frame(),
            Dimensions::new(100, 100),
            DEFAULT_MIN_CONFIDENCE,
            TemperatureUnit::Kelvin,
        );
        assert!(overlay.is_none());
    }

    #[test]
    fn test_resolve_clamps_to_display() {
        let faces = [DetectedFace {
            rect: DisplayRect::new(150.0, -20.0, 100.0, 60.0),
            confidence: 0.8,
        }];
        let overlay = resolve_face(
            &faces,
            Dimensions::new(200, 200),
            &frame(),
            Dimensions::new(100, 100),
            DEFAULT_MIN_CONFIDENCE,
            TemperatureUnit::Kelvin,
        )
        .unwrap();
        assert_eq!(overlay.rect, DisplayRect::new(75.0, 0.0, 25.0, 20.0));
    }

    #[test]
    fn test_zero_faces_resolve_slot() {
        let (stage, buffer) = stage(Arc::new(FixedDetector(Vec::new())), CorrelationPolicy::Fifo);
        buffer.push(pending(1));

        let ticket = stage.try_acquire().unwrap();
        stage.submit(ticket, request(1));
        assert!(stage.wait_idle(Duration::from_secs(5)));

        assert_eq!(buffer.pop().unwrap().face, FaceSlot::Resolved(None));
        assert_eq!(stage.counters().attached, 1);
    }

    #[test]
    fn test_single_request_in_flight() {
        let detector = Arc::new(GatedDetector {
            gate: Mutex::new(false),
        });
        let (stage, buffer) = stage(detector.clone(), CorrelationPolicy::Fifo);
        buffer.push(pending(1));

        let ticket = stage.try_acquire().unwrap();
        stage.submit(ticket, request(1));
        assert!(stage.try_acquire().is_none());

        *detector.gate.lock().unwrap() = true;
        assert!(stage.wait_idle(Duration::from_secs(5)));
        assert!(stage.try_acquire().is_some());
        assert!(buffer.pop().unwrap().face.face().is_some());
    }

    #[test]
    fn test_unused_ticket_frees_slot() {
        let (stage, _buffer) = stage(Arc::new(FixedDetector(Vec::new())), CorrelationPolicy::Fifo);
        drop(stage.try_acquire().unwrap());
        assert!(!stage.is_busy());
        assert!(stage.try_acquire().is_some());
    }

    #[test]
    fn test_exact_policy_discards_missing_sequence() {
        let detector = Arc::new(FixedDetector(vec![face(0.9)]));
        let (stage, buffer) = stage(detector, CorrelationPolicy::Exact);
        buffer.push(pending(2));

        let ticket = stage.try_acquire().unwrap();
        stage.submit(ticket, request(1));
        assert!(stage.wait_idle(Duration::from_secs(5)));

        assert_eq!(buffer.pop().unwrap().face, FaceSlot::Pending);
        assert_eq!(stage.counters().discarded, 1);
    }

    #[test]
    fn test_result_finishing_during_shutdown_not_attached() {
        let detector = Arc::new(GatedDetector {
            gate: Mutex::new(false),
        });
        let (stage, buffer) = stage(detector.clone(), CorrelationPolicy::Fifo);
        buffer.push(pending(1));

        let ticket = stage.try_acquire().unwrap();
        stage.submit(ticket, request(1));
        // The detector finishes while the buffer is locked; the generation
        // moves on before the job can take the lock.
        buffer.exclusive(|| {
            *detector.gate.lock().unwrap() = true;
            thread::sleep(Duration::from_millis(20));
            stage.shared.generation.fetch_add(1, Ordering::AcqRel);
        });
        assert!(stage.wait_idle(Duration::from_secs(5)));

        assert_eq!(buffer.pop().unwrap().face, FaceSlot::Pending);
        assert_eq!(stage.counters().attached, 0);
        assert_eq!(stage.counters().discarded, 1);
    }

    #[test]
    fn test_shutdown_discards_in_flight_result() {
        let detector = Arc::new(GatedDetector {
            gate: Mutex::new(false),
        });
        let (stage, buffer) = stage(detector.clone(), CorrelationPolicy::Fifo);
        buffer.push(pending(1));

        let ticket = stage.try_acquire().unwrap();
        stage.submit(ticket, request(1));
        stage.shutdown();
        *detector.gate.lock().unwrap() = true;
        assert!(stage.wait_idle(Duration::from_secs(5)));

        assert_eq!(buffer.pop().unwrap().face, FaceSlot::Pending);
        assert_eq!(stage.counters().discarded, 1);
        assert!(stage.try_acquire().is_none());

        stage.resume();
        assert!(stage.try_acquire().is_some());
    }
}
