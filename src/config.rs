//! File configuration.
//!
//! Every section is optional; missing sections and fields take their
//! defaults.
//!
//! ```toml
//! unit = "celsius"
//!
//! [sensor]
//! thermal_width = 160
//! thermal_height = 120
//!
//! [display]
//! width = 640
//! height = 480
//! refresh_hz = 60
//!
//! [buffer]
//! capacity = 21
//! push_timeout_ms = 5
//!
//! [detection]
//! enabled = true
//! min_confidence = 0.51
//! policy = "fifo"
//!
//! [logging]
//! window_secs = 15
//! directory = "logs"
//!
//! [region]
//! left = 40
//! top = 20
//! width = 80
//! height = 80
//! ```

use crate::calibration::CalibrationParams;
use crate::capture::{ConfigError, SensorConfig, TemperatureUnit};
use crate::detection::{CorrelationPolicy, FaceStageConfig, DEFAULT_MIN_CONFIDENCE};
use crate::geometry::MeasurementRegion;
use crate::handoff::BufferConfig;
use crate::pipeline::{DisplayConfig, PipelineConfig, PipelineSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Face detection section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run face detection on visual frames.
    pub enabled: bool,
    /// Detections below this confidence are ignored.
    pub min_confidence: f32,
    /// How results are matched to buffered frames.
    pub policy: CorrelationPolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            policy: CorrelationPolicy::Fifo,
        }
    }
}

/// Measurement log section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Length of a log window in seconds.
    pub window_secs: u64,
    /// Directory log files are written to.
    pub directory: PathBuf,
    /// Batches the background writer may hold before dropping.
    pub queue_size: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            window_secs: 15,
            directory: PathBuf::from("logs"),
            queue_size: 32,
        }
    }
}

/// Metrics exporter section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` and `/health`.
    pub enabled: bool,
    /// Listen port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Emulated sensor.
    pub sensor: SensorConfig,
    /// Display size and refresh rate.
    pub display: DisplayConfig,
    /// Hand-off buffer.
    pub buffer: BufferConfig,
    /// Face detection.
    pub detection: DetectionConfig,
    /// Measurement log.
    pub logging: LoggingConfig,
    /// Calibration defaults.
    pub calibration: CalibrationParams,
    /// Metrics exporter.
    pub metrics: MetricsConfig,
    /// Presentation unit.
    pub unit: TemperatureUnit,
    /// Initial region; centred when absent.
    pub region: Option<MeasurementRegion>,
}

impl FileConfig {
    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml(&text)
    }

    /// Parses and validates TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor.validate()?;
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.display.refresh_hz > 240 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if self.buffer.capacity == 0 {
            return Err(ConfigError::InvalidValue("buffer.capacity must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(ConfigError::InvalidValue(
                "detection.min_confidence must be within [0, 1]".into(),
            ));
        }
        if self.logging.window_secs == 0 {
            return Err(ConfigError::InvalidValue("logging.window_secs must be positive".into()));
        }
        self.calibration
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        if let Some(region) = self.region {
            if region.is_empty() {
                return Err(ConfigError::InvalidValue("region must not be empty".into()));
            }
        }
        Ok(())
    }

    /// Pipeline configuration derived from the file.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            display: self.display,
            buffer: self.buffer,
            faces: FaceStageConfig {
                min_confidence: self.detection.min_confidence,
                policy: self.detection.policy,
            },
            log_window: Duration::from_secs(self.logging.window_secs),
            initial: PipelineSettings {
                region: self.region,
                calibration: self.calibration,
                unit: self.unit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.buffer.capacity, 21);
        assert_eq!(config.logging.window_secs, 15);
        assert_eq!(config.detection.min_confidence, 0.51);
    }

    #[test]
    fn test_partial_sections() {
        let config = FileConfig::from_toml(
            r#"
            unit = "fahrenheit"

            [buffer]
            push_timeout_ms = 2

            [detection]
            policy = "exact"

            [calibration]
            emissivity = 0.98
            distance_unit = "feet"

            [region]
            left = 1
            top = 2
            width = 3
            height = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(config.buffer.capacity, 21);
        assert_eq!(config.buffer.push_timeout_ms, 2);
        assert_eq!(config.detection.policy, CorrelationPolicy::Exact);
        assert_eq!(config.calibration.emissivity, 0.98);
        assert_eq!(config.region, Some(MeasurementRegion::new(1, 2, 3, 4)));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.faces.policy, CorrelationPolicy::Exact);
        assert_eq!(pipeline.initial.unit, TemperatureUnit::Fahrenheit);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[buffer]\ncapacity = 0"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("[calibration]\nemissivity = 2.0"),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("[display]\nwidth = 0"),
            Err(ConfigError::InvalidDimensions)
        ));
        assert!(matches!(
            FileConfig::from_toml("unit = \"rankine\""),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileConfig::from_file("/nonexistent/thermal.toml"),
            Err(ConfigError::FileReadError(_))
        ));
    }
}
