//! Built-in sensor emulator.
//!
//! Streams synthetic captures on a dedicated thread: a warm horizontal
//! gradient, a hot spot orbiting the frame centre and a little seeded
//! noise. The paired visual frame shows a skin-toned face patch at the
//! hot spot's position so that face overlays line up with the heat.

use super::{
    FrameCallback, SensorCapture, SensorConfig, SensorError, SensorSource, ThermalFrame,
    VisualFrame,
};
use image::{Rgb, RgbImage};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Frames per full orbit of the hot spot.
const ORBIT_FRAMES: f64 = 120.0;
/// Peak-to-peak sensor noise in Kelvin.
const NOISE_KELVIN: f64 = 0.1;
const SKIN_TONE: Rgb<u8> = Rgb([224, 172, 138]);

/// Synthetic thermal camera.
pub struct EmulatedSensor {
    config: SensorConfig,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EmulatedSensor {
    /// Validates `config` and prepares an idle emulator.
    pub fn new(config: SensorConfig) -> Result<Self, SensorError> {
        config
            .validate()
            .map_err(|e| SensorError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    /// The emulator configuration.
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }
}

impl SensorSource for EmulatedSensor {
    fn subscribe(&mut self, mut on_frame: FrameCallback) -> Result<(), SensorError> {
        if self.worker.is_some() {
            return Err(SensorError::AlreadyStreaming);
        }

        self.stop_flag.store(false, Ordering::Release);
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();
        let interval = Duration::from_secs_f64(1.0 / f64::from(config.fps));

        let handle = thread::Builder::new()
            .name("thermal-emulator".into())
            .spawn(move || {
                let mut synth = FrameSynthesizer::new(config);
                while !stop_flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    let capture_time = chrono::Utc::now().timestamp_millis();
                    on_frame(synth.next_capture(capture_time));
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                tracing::debug!(frames = synth.frame_index, "Emulator thread exiting");
            })
            .map_err(|e| SensorError::StartFailed(e.to_string()))?;

        self.worker = Some(handle);
        tracing::info!(
            width = self.config.thermal_width,
            height = self.config.thermal_height,
            fps = self.config.fps,
            "EmulatedSensor streaming"
        );
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Emulator thread panicked");
            }
            tracing::info!("EmulatedSensor stopped");
        }
    }

    fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for EmulatedSensor {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Deterministic capture generator behind the emulator.
pub struct FrameSynthesizer {
    config: SensorConfig,
    rng: ChaCha8Rng,
    frame_index: u64,
}

impl FrameSynthesizer {
    /// Seeds a synthesizer from `config.seed`.
    pub fn new(config: SensorConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            frame_index: 0,
        }
    }

    /// Centre of the hot spot in thermal-grid coordinates for a frame.
    pub fn hot_spot_center(&self, frame_index: u64) -> (f64, f64) {
        let w = f64::from(self.config.thermal_width);
        let h = f64::from(self.config.thermal_height);
        let angle = TAU * (frame_index as f64 % ORBIT_FRAMES) / ORBIT_FRAMES;
        let radius = w.min(h) / 4.0;
        (w / 2.0 + radius * angle.cos(), h / 2.0 + radius * angle.sin())
    }

    /// Produces the next capture.
    pub fn next_capture(&mut self, capture_time_millis: i64) -> SensorCapture {
        let (cx, cy) = self.hot_spot_center(self.frame_index);
        let thermal = self.thermal_frame(cx, cy, capture_time_millis);
        let visual = self
            .config
            .with_visual
            .then(|| VisualFrame::new(self.visual_image(cx, cy)));
        self.frame_index += 1;
        SensorCapture::new(thermal, visual)
    }

    fn thermal_frame(&mut self, cx: f64, cy: f64, capture_time_millis: i64) -> ThermalFrame {
        let width = self.config.thermal_width;
        let height = self.config.thermal_height;
        let sigma = f64::from(width.min(height)) / 10.0;
        let peak = self.config.hot_spot_kelvin - self.config.ambient_kelvin;

        let mut grid = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let gradient = 4.0 * (f64::from(x) / f64::from(width) - 0.5);
                let dx = f64::from(x) - cx;
                let dy = f64::from(y) - cy;
                let blob = peak * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                grid.push(self.config.ambient_kelvin + gradient + blob + self.noise());
            }
        }
        ThermalFrame::new(grid, width, height, capture_time_millis)
    }

    fn visual_image(&self, cx: f64, cy: f64) -> RgbImage {
        let width = self.config.visual_width;
        let height = self.config.visual_height;
        let sx = f64::from(width) / f64::from(self.config.thermal_width);
        let sy = f64::from(height) / f64::from(self.config.thermal_height);
        let (fx, fy) = (cx * sx, cy * sy);
        let rx = f64::from(width) / 12.0;
        let ry = rx * 1.3;

        RgbImage::from_fn(width, height, |x, y| {
            let nx = (f64::from(x) - fx) / rx;
            let ny = (f64::from(y) - fy) / ry;
            if nx * nx + ny * ny <= 1.0 {
                SKIN_TONE
            } else {
                let shade = (60 + (y * 80) / height.max(1)) as u8;
                Rgb([shade / 2, shade / 2, shade])
            }
        })
    }

    fn noise(&mut self) -> f64 {
        let unit = f64::from(self.rng.next_u32()) / f64::from(u32::MAX);
        (unit - 0.5) * NOISE_KELVIN
    }
}
