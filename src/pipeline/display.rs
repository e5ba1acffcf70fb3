//! Display side of the hand-off: a loop that drains the buffer at the
//! display's refresh rate and hands bundles to a sink.

use crate::compositing::FrameBundle;
use crate::handoff::FrameHandoffBuffer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Receives finished bundles on the display thread.
pub trait DisplaySink: Send + Sync {
    /// Takes ownership of a bundle to display.
    fn deliver(&self, bundle: FrameBundle);
}

/// Display surface geometry and cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display width in pixels.
    pub width: u32,
    /// Display height in pixels.
    pub height: u32,
    /// Ticks per second of the display loop. Zero disables the loop;
    /// the owner then drains the buffer itself.
    pub refresh_hz: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            refresh_hz: 60,
        }
    }
}

/// Keeps every delivered bundle.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    delivered: Mutex<Vec<FrameBundle>>,
}

impl RecordingDisplay {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bundle delivered so far, in order.
    pub fn delivered(&self) -> Vec<FrameBundle> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of bundles delivered.
    pub fn len(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was delivered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent bundle.
    pub fn last(&self) -> Option<FrameBundle> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl DisplaySink for RecordingDisplay {
    fn deliver(&self, bundle: FrameBundle) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bundle);
    }
}

/// Keeps only the most recent bundle.
#[derive(Debug, Default)]
pub struct LatestFrameDisplay {
    latest: Mutex<Option<FrameBundle>>,
    delivered: AtomicU64,
}

impl LatestFrameDisplay {
    /// Display with nothing delivered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent bundle.
    pub fn latest(&self) -> Option<FrameBundle> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of bundles delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl DisplaySink for LatestFrameDisplay {
    fn deliver(&self, bundle: FrameBundle) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(bundle);
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Hook run on every display tick, after delivery.
pub type TickHook = Box<dyn FnMut() + Send + 'static>;

/// Background display loop.
pub struct DisplayLoop {
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl DisplayLoop {
    /// Spawns the loop. Each tick pops at most one bundle; an empty
    /// buffer just skips the tick.
    pub fn spawn(
        buffer: Arc<FrameHandoffBuffer>,
        sink: Arc<dyn DisplaySink>,
        refresh_hz: u32,
        mut on_tick: TickHook,
    ) -> std::io::Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);
        let interval = Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1)));

        let worker = thread::Builder::new()
            .name("display-loop".into())
            .spawn(move || {
                let mut delivered = 0u64;
                while !stop.load(Ordering::Acquire) {
                    let started = Instant::now();
                    if let Some(bundle) = buffer.pop() {
                        sink.deliver(bundle);
                        delivered += 1;
                    }
                    on_tick();
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                tracing::debug!(delivered, "Display loop exiting");
            })?;

        tracing::info!(refresh_hz, "Display loop started");
        Ok(Self {
            stop_flag,
            worker: Some(worker),
        })
    }

    /// Stops the loop and waits for its last tick to finish.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("Display loop panicked");
            }
        }
    }
}

impl Drop for DisplayLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
