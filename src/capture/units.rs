//! Temperature units.
//!
//! Everything is stored and compared in Kelvin. Conversions happen
//! only when a value is labelled for display or written to the log.

use serde::{Deserialize, Serialize};

const CELSIUS_OFFSET: f64 = 273.15;

/// Presentation unit for temperature values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Kelvin.
    Kelvin,
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Converts a Kelvin value into this unit.
    pub fn from_kelvin(self, kelvin: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin,
            TemperatureUnit::Celsius => kelvin - CELSIUS_OFFSET,
            TemperatureUnit::Fahrenheit => (kelvin - CELSIUS_OFFSET) * 9.0 / 5.0 + 32.0,
        }
    }

    /// Converts a value expressed in this unit back to Kelvin.
    pub fn to_kelvin(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => value,
            TemperatureUnit::Celsius => value + CELSIUS_OFFSET,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0 + CELSIUS_OFFSET,
        }
    }

    /// Single-letter label drawn next to values.
    pub fn symbol(self) -> char {
        match self {
            TemperatureUnit::Kelvin => 'K',
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }

    /// Unit selected by the toolbar toggle: K → C → F → K.
    pub fn next(self) -> Self {
        match self {
            TemperatureUnit::Kelvin => TemperatureUnit::Celsius,
            TemperatureUnit::Celsius => TemperatureUnit::Fahrenheit,
            TemperatureUnit::Fahrenheit => TemperatureUnit::Kelvin,
        }
    }
}

/// Rounds to two decimal digits for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
