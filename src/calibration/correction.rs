//! Radiometric correction of apparent temperatures.
//!
//! Sensor values arrive as apparent temperatures (emissivity 1, no
//! attenuation). The correction works in total-radiance space, where
//! radiance is proportional to T^4, and removes the contributions of
//! external optics, atmosphere and reflected surroundings:
//!
//! ```text
//! W_meas = τ_ext·[τ_atm·(ε·W_obj + (1-ε)·W_refl) + (1-τ_atm)·W_atm] + (1-τ_ext)·W_ext
//! ```

use super::CalibrationParams;
use crate::capture::ThermalFrame;

const CELSIUS_OFFSET: f64 = 273.15;

// Atmospheric transmission constants (FLIR defaults).
const ATM_ALPHA_1: f64 = 0.006569;
const ATM_ALPHA_2: f64 = 0.01262;
const ATM_BETA_1: f64 = -0.002276;
const ATM_BETA_2: f64 = -0.00667;
const ATM_X: f64 = 1.9;
const H2O_SERIES: [f64; 4] = [1.5587, 0.06939, -0.00027816, 0.00000068455];

/// Applies calibration parameters to a frame before it is measured.
pub trait Calibrator: Send + Sync {
    /// Returns the calibrated frame. Metadata is preserved.
    fn calibrate(&self, frame: ThermalFrame, params: &CalibrationParams) -> ThermalFrame;
}

/// Leaves frames untouched, for sources that calibrate on-device.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Calibrator for Passthrough {
    fn calibrate(&self, frame: ThermalFrame, _params: &CalibrationParams) -> ThermalFrame {
        frame
    }
}

/// Emissivity, reflection and transmission correction.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmissivityCorrection;

impl EmissivityCorrection {
    /// Estimated atmospheric transmission when none is configured.
    pub fn atmospheric_transmission(params: &CalibrationParams) -> f64 {
        if params.transmission > 0.0 {
            return params.transmission.min(1.0);
        }
        let t = params.atmospheric_temperature - CELSIUS_OFFSET;
        let h2o = params.relative_humidity * power_series_at(&H2O_SERIES, t).exp();
        let h2o_sqrt = h2o.sqrt();
        let dist_factor = params.distance_meters().max(0.0).sqrt();

        let tau = ATM_X * (-dist_factor * (ATM_ALPHA_1 + ATM_BETA_1 * h2o_sqrt)).exp()
            + (1.0 - ATM_X) * (-dist_factor * (ATM_ALPHA_2 + ATM_BETA_2 * h2o_sqrt)).exp();
        tau.clamp(f64::EPSILON, 1.0)
    }

    /// Returns a per-sample transform for the given parameters.
    pub fn transform(params: &CalibrationParams) -> impl Fn(f64) -> f64 {
        let e = params.emissivity;
        let tau_atm = Self::atmospheric_transmission(params);
        let tau_ext = params.external_optics_transmission;
        let w_refl = params.reflected_temperature.powi(4);
        let w_atm = params.atmospheric_temperature.powi(4);
        let w_ext = params.external_optics_temperature.powi(4);

        move |apparent: f64| {
            let w_meas = apparent.powi(4);
            let w_before_optics = (w_meas - (1.0 - tau_ext) * w_ext) / tau_ext;
            let w_before_air = (w_before_optics - (1.0 - tau_atm) * w_atm) / tau_atm;
            let w_obj = (w_before_air - (1.0 - e) * w_refl) / e;
            if w_obj > 0.0 && w_obj.is_finite() {
                w_obj.powf(0.25)
            } else {
                // Scene colder than the modelled surroundings; keep the reading.
                apparent
            }
        }
    }
}

impl Calibrator for EmissivityCorrection {
    fn calibrate(&self, frame: ThermalFrame, params: &CalibrationParams) -> ThermalFrame {
        let correct = Self::transform(params);
        let grid = frame.grid().iter().map(|&v| correct(v)).collect();
        frame.with_grid(grid)
    }
}

#[inline]
fn power_series_at(coeffs: &[f64], x: f64) -> f64 {
    let mut pow = 1.;
    let mut sum = 0.;
    for coeff in coeffs.iter() {
        sum += pow * coeff;
        pow *= x;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_params_leave_values() {
        let frame = ThermalFrame::new(vec![290.0, 300.0, 310.0, 320.0], 2, 2, 0);
        let out = EmissivityCorrection.calibrate(frame, &CalibrationParams::identity());
        for (got, want) in out.grid().iter().zip([290.0, 300.0, 310.0, 320.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_low_emissivity_raises_hot_objects() {
        let params = CalibrationParams {
            emissivity: 0.8,
            ..CalibrationParams::identity()
        };
        let correct = EmissivityCorrection::transform(&params);
        // A surface warmer than its surroundings looks colder than it is.
        assert!(correct(310.0) > 310.0);
    }

    #[test]
    fn test_transmission_estimated_near_one_at_short_range() {
        let tau = EmissivityCorrection::atmospheric_transmission(&CalibrationParams::default());
        assert!(tau > 0.95 && tau <= 1.0, "tau = {tau}");
    }

    #[test]
    fn test_transmission_drops_with_distance() {
        let near = CalibrationParams {
            distance: 1.0,
            ..Default::default()
        };
        let far = CalibrationParams {
            distance: 100.0,
            ..Default::default()
        };
        assert!(
            EmissivityCorrection::atmospheric_transmission(&far)
                < EmissivityCorrection::atmospheric_transmission(&near)
        );
    }

    #[test]
    fn test_calibration_preserves_metadata() {
        let frame = ThermalFrame::new(vec![300.0; 4], 2, 2, 99).with_sequence(3);
        let out = EmissivityCorrection.calibrate(frame, &CalibrationParams::default());
        assert_eq!(out.sequence(), 3);
        assert_eq!(out.capture_time_millis(), 99);
        assert!(out.is_valid());
    }
}
