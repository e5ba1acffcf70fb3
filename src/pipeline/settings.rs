//! User-adjustable settings shared with the capture thread.

use crate::calibration::{CalibrationError, CalibrationParams};
use crate::capture::TemperatureUnit;
use crate::compositing::FrameSettings;
use crate::geometry::{Dimensions, MeasurementRegion};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Measurement settings. `region: None` means "centred default",
/// resolved on the first frame once the sensor geometry is known.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Region to measure; centred on the frame when unset.
    pub region: Option<MeasurementRegion>,
    /// Calibration parameters.
    pub calibration: CalibrationParams,
    /// Presentation unit.
    pub unit: TemperatureUnit,
}

impl PipelineSettings {
    /// Per-frame settings for a frame of `dims`.
    pub fn resolve(&self, dims: Dimensions) -> FrameSettings {
        FrameSettings {
            region: self
                .region
                .unwrap_or_else(|| MeasurementRegion::centered(dims)),
            calibration: self.calibration,
            unit: self.unit,
        }
    }
}

/// Cloneable handle to the live settings.
///
/// Writers replace fields wholesale; the capture thread copies the
/// whole struct once per frame, so a frame never mixes old and new values.
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<PipelineSettings>>,
}

impl SettingsHandle {
    /// Handle holding `initial`.
    pub fn new(initial: PipelineSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, PipelineSettings> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, PipelineSettings> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> PipelineSettings {
        *self.read()
    }

    /// Settings for the next frame. Fixes the centred default region in
    /// place the first time the sensor geometry is seen.
    pub fn frame_settings(&self, dims: Dimensions) -> FrameSettings {
        let current = self.snapshot();
        if current.region.is_some() {
            return current.resolve(dims);
        }
        let mut settings = self.write();
        let region = *settings
            .region
            .get_or_insert_with(|| MeasurementRegion::centered(dims));
        FrameSettings {
            region,
            calibration: settings.calibration,
            unit: settings.unit,
        }
    }

    /// Replaces the measurement region.
    pub fn set_region(&self, region: MeasurementRegion) {
        self.write().region = Some(region);
        tracing::debug!(%region, "Measurement region set");
    }

    /// Returns to the centred default region.
    pub fn reset_region(&self, dims: Dimensions) -> MeasurementRegion {
        let region = MeasurementRegion::centered(dims);
        self.set_region(region);
        region
    }

    /// Centres the region on `(cx, cy)` in sensor cells.
    pub fn pan_region(&self, cx: f64, cy: f64, dims: Dimensions) -> MeasurementRegion {
        let mut settings = self.write();
        let current = settings
            .region
            .unwrap_or_else(|| MeasurementRegion::centered(dims));
        let moved = current.pan_to(cx, cy, dims);
        settings.region = Some(moved);
        moved
    }

    /// Scales the region about its centre. Returns false, leaving the
    /// region unchanged, when the result would leave the frame.
    pub fn zoom_region(&self, factor: f64, dims: Dimensions) -> bool {
        let mut settings = self.write();
        let current = settings
            .region
            .unwrap_or_else(|| MeasurementRegion::centered(dims));
        match current.zoom(factor, dims) {
            Some(zoomed) => {
                settings.region = Some(zoomed);
                true
            }
            None => false,
        }
    }

    /// Replaces the calibration parameters after validating them.
    pub fn set_calibration(&self, params: CalibrationParams) -> Result<(), CalibrationError> {
        params.validate()?;
        self.write().calibration = params;
        tracing::info!(emissivity = params.emissivity, "Calibration updated");
        Ok(())
    }

    /// Sets the presentation unit.
    pub fn set_unit(&self, unit: TemperatureUnit) {
        self.write().unit = unit;
    }

    /// Advances K → C → F → K and returns the new unit.
    pub fn cycle_unit(&self) -> TemperatureUnit {
        let mut settings = self.write();
        settings.unit = settings.unit.next();
        settings.unit
    }
}
