//! Physical parameters applied to every frame before measurement.

use serde::{Deserialize, Serialize};

const FEET_PER_METER: f64 = 3.280_839_895;

/// Unit of the object distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    /// Metres.
    #[default]
    Meter,
    /// Feet.
    Feet,
}

/// Calibration parameters, all temperatures in Kelvin.
///
/// The defaults are the sensor defaults used until the user saves a
/// calibration, so measurement never waits on calibration input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Object emissivity (0, 1].
    pub emissivity: f64,
    /// Reflected apparent temperature.
    pub reflected_temperature: f64,
    /// Atmospheric temperature.
    pub atmospheric_temperature: f64,
    /// Relative humidity as a fraction [0, 1].
    pub relative_humidity: f64,
    /// Object distance, in `distance_unit`.
    pub distance: f64,
    /// Unit of `distance`.
    pub distance_unit: DistanceUnit,
    /// Atmospheric transmission (0, 1]. Zero means estimate it from
    /// distance, humidity and atmospheric temperature.
    pub transmission: f64,
    /// Temperature of external optics (protective window, lens).
    pub external_optics_temperature: f64,
    /// Transmission of external optics (0, 1].
    pub external_optics_transmission: f64,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            emissivity: 0.95,
            reflected_temperature: 293.15,
            atmospheric_temperature: 293.15,
            relative_humidity: 0.5,
            distance: 1.0,
            distance_unit: DistanceUnit::Meter,
            transmission: 0.0,
            external_optics_temperature: 293.15,
            external_optics_transmission: 1.0,
        }
    }
}

impl CalibrationParams {
    /// Parameters under which calibration leaves apparent temperatures
    /// unchanged: a black body seen through perfectly clear air and optics.
    pub fn identity() -> Self {
        Self {
            emissivity: 1.0,
            transmission: 1.0,
            external_optics_transmission: 1.0,
            ..Self::default()
        }
    }

    /// Object distance converted to meters.
    pub fn distance_meters(&self) -> f64 {
        match self.distance_unit {
            DistanceUnit::Meter => self.distance,
            DistanceUnit::Feet => self.distance / FEET_PER_METER,
        }
    }

    /// Validates parameter ranges.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if !(self.emissivity > 0.0 && self.emissivity <= 1.0) {
            return Err(CalibrationError::OutOfRange {
                name: "emissivity",
                value: self.emissivity,
            });
        }
        if !(0.0..=1.0).contains(&self.relative_humidity) {
            return Err(CalibrationError::OutOfRange {
                name: "relative_humidity",
                value: self.relative_humidity,
            });
        }
        if !(0.0..=1.0).contains(&self.transmission) {
            return Err(CalibrationError::OutOfRange {
                name: "transmission",
                value: self.transmission,
            });
        }
        if !(self.external_optics_transmission > 0.0 && self.external_optics_transmission <= 1.0) {
            return Err(CalibrationError::OutOfRange {
                name: "external_optics_transmission",
                value: self.external_optics_transmission,
            });
        }
        if !(self.distance >= 0.0 && self.distance.is_finite()) {
            return Err(CalibrationError::OutOfRange {
                name: "distance",
                value: self.distance,
            });
        }
        for (name, value) in [
            ("reflected_temperature", self.reflected_temperature),
            ("atmospheric_temperature", self.atmospheric_temperature),
            ("external_optics_temperature", self.external_optics_temperature),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(CalibrationError::OutOfRange { name, value });
            }
        }
        Ok(())
    }
}

/// Calibration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    /// A parameter lies outside its valid range.
    #[error("calibration parameter {name} out of range: {value}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },
}
