//! Sensor source abstraction.
//!
//! A sensor source pushes captures to a callback on its own thread.
//! The pipeline subscribes once per run and unsubscribes on stop.
//! Captures are handed over by value, so the source is free to reuse
//! its driver buffers as soon as the callback returns.

use super::SensorCapture;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Callback invoked once per available capture.
pub type FrameCallback = Box<dyn FnMut(SensorCapture) + Send + 'static>;

/// Errors that can occur while streaming from a sensor.
#[derive(Debug, Error)]
pub enum SensorError {
    /// `subscribe` was called twice.
    #[error("sensor is already streaming")]
    AlreadyStreaming,
    /// The stream could not be started.
    #[error("failed to start sensor stream: {0}")]
    StartFailed(String),
    /// The sensor configuration was rejected.
    #[error("invalid sensor configuration: {0}")]
    InvalidConfig(String),
}

/// Trait for thermal sensor implementations.
///
/// This abstraction allows swapping between a real camera SDK,
/// the built-in emulator and scripted test sources.
pub trait SensorSource: Send {
    /// Starts streaming, invoking `on_frame` for every capture.
    fn subscribe(&mut self, on_frame: FrameCallback) -> Result<(), SensorError>;

    /// Stops streaming. No callback runs after this returns.
    fn unsubscribe(&mut self);

    /// Checks if the source is currently streaming.
    fn is_streaming(&self) -> bool;
}

type SharedCallback = Arc<Mutex<Option<FrameCallback>>>;

/// Scripted sensor for tests: captures are emitted explicitly through a
/// [`SensorTrigger`] on the caller's thread.
#[derive(Default)]
pub struct MockSensor {
    callback: SharedCallback,
}

impl MockSensor {
    /// Sensor with no subscriber yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle that can emit captures into the subscribed callback.
    pub fn trigger(&self) -> SensorTrigger {
        SensorTrigger {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl SensorSource for MockSensor {
    fn subscribe(&mut self, on_frame: FrameCallback) -> Result<(), SensorError> {
        let mut slot = self
            .callback
            .lock()
            .map_err(|_| SensorError::StartFailed("callback lock poisoned".into()))?;
        if slot.is_some() {
            return Err(SensorError::AlreadyStreaming);
        }
        *slot = Some(on_frame);
        tracing::info!("MockSensor subscribed");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Ok(mut slot) = self.callback.lock() {
            slot.take();
        }
        tracing::info!("MockSensor unsubscribed");
    }

    fn is_streaming(&self) -> bool {
        self.callback.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// Emits captures into a [`MockSensor`]'s subscriber.
#[derive(Clone)]
pub struct SensorTrigger {
    callback: SharedCallback,
}

impl SensorTrigger {
    /// Delivers one capture. Returns false when nobody is subscribed.
    pub fn emit(&self, capture: SensorCapture) -> bool {
        let Ok(mut slot) = self.callback.lock() else {
            return false;
        };
        match slot.as_mut() {
            Some(callback) => {
                callback(capture);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ThermalFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn capture() -> SensorCapture {
        SensorCapture::new(ThermalFrame::new(vec![300.0; 4], 2, 2, 0), None)
    }

    #[test]
    fn test_mock_sensor_lifecycle() {
        let mut sensor = MockSensor::new();
        let trigger = sensor.trigger();
        let seen = Arc::new(AtomicUsize::new(0));

        assert!(!sensor.is_streaming());
        assert!(!trigger.emit(capture()));

        let counter = Arc::clone(&seen);
        sensor
            .subscribe(Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert!(sensor.is_streaming());

        assert!(trigger.emit(capture()));
        assert!(trigger.emit(capture()));
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        sensor.unsubscribe();
        assert!(!sensor.is_streaming());
        assert!(!trigger.emit(capture()));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_double_subscribe_rejected() {
        let mut sensor = MockSensor::new();
        sensor.subscribe(Box::new(|_| {})).unwrap();
        assert!(matches!(
            sensor.subscribe(Box::new(|_| {})),
            Err(SensorError::AlreadyStreaming)
        ));
    }
}
