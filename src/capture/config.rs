//! Sensor configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the emulated sensor stream.
///
/// Real camera SDKs report their own geometry; these values only drive
/// the built-in emulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Thermal grid width in cells.
    pub thermal_width: u32,
    /// Thermal grid height in cells.
    pub thermal_height: u32,
    /// Visual image width in pixels.
    pub visual_width: u32,
    /// Visual image height in pixels.
    pub visual_height: u32,
    /// Emit a paired visual frame with every thermal frame.
    pub with_visual: bool,
    /// Target frames per second.
    pub fps: u32,
    /// Background scene temperature in Kelvin.
    pub ambient_kelvin: f64,
    /// Peak temperature of the moving hot spot in Kelvin.
    pub hot_spot_kelvin: f64,
    /// Seed for the synthetic sensor noise.
    pub seed: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            thermal_width: 160,
            thermal_height: 120,
            visual_width: 640,
            visual_height: 480,
            with_visual: true,
            fps: 9, // FLIR ONE streams at ~8.7 Hz
            ambient_kelvin: 295.15,
            hot_spot_kelvin: 309.65,
            seed: 0x5eed,
        }
    }
}

impl SensorConfig {
    /// Creates a new configuration with the specified thermal dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            thermal_width: width,
            thermal_height: height,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thermal_width == 0 || self.thermal_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.with_visual && (self.visual_width == 0 || self.visual_height == 0) {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        if !self.ambient_kelvin.is_finite() || self.ambient_kelvin <= 0.0 {
            return Err(ConfigError::InvalidValue("ambient_kelvin must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate outside 1-120 fps.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// A value failed validation.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SensorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = SensorConfig::default();
        config.thermal_width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_visual_dimensions_ignored_without_visual() {
        let mut config = SensorConfig::with_dimensions(80, 60);
        config.with_visual = false;
        config.visual_width = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_rate_bounds() {
        let mut config = SensorConfig::default();
        config.fps = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFrameRate)
        ));
        config.fps = 121;
        assert!(config.validate().is_err());
    }
}
