//! Frame types handed over by a sensor source.

use super::TemperatureUnit;
use image::RgbImage;

/// A single calibrated capture from the thermal sensor.
///
/// The grid is row-major and always stored in Kelvin. `unit` is the
/// presentation unit the source's metadata asks for; it never affects
/// the stored values.
#[derive(Clone)]
pub struct ThermalFrame {
    /// Temperature samples in Kelvin, `width * height` entries.
    grid: Vec<f64>,
    /// Grid width in cells.
    width: u32,
    /// Grid height in cells.
    height: u32,
    /// Presentation unit from the image metadata.
    unit: TemperatureUnit,
    /// Wall-clock capture time in milliseconds since the Unix epoch.
    capture_time_millis: i64,
    /// Monotonic sequence number, assigned by the pipeline.
    sequence: u64,
}

impl ThermalFrame {
    /// Creates a new frame with the given parameters.
    pub fn new(grid: Vec<f64>, width: u32, height: u32, capture_time_millis: i64) -> Self {
        Self {
            grid,
            width,
            height,
            unit: TemperatureUnit::default(),
            capture_time_millis,
            sequence: 0,
        }
    }

    /// Sets the presentation unit carried with the frame.
    pub fn with_unit(mut self, unit: TemperatureUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Returns the temperature grid in Kelvin.
    #[inline]
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Consumes the frame and returns its grid.
    ///
    /// Used by calibrators that rewrite values before the frame is shared.
    pub fn into_grid(self) -> Vec<f64> {
        self.grid
    }

    /// Returns a copy of this frame's metadata with a replacement grid.
    pub fn with_grid(&self, grid: Vec<f64>) -> Self {
        Self {
            grid,
            width: self.width,
            height: self.height,
            unit: self.unit,
            capture_time_millis: self.capture_time_millis,
            sequence: self.sequence,
        }
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Unit the grid values are in.
    #[inline]
    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    /// Sensor timestamp in milliseconds.
    #[inline]
    pub fn capture_time_millis(&self) -> i64 {
        self.capture_time_millis
    }

    /// Capture order assigned by the sensor.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the number of cells (width * height).
    #[inline]
    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the grid length matches the dimensions.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.grid.len() == self.cell_count()
    }

    /// Returns the value at grid coordinate `(x, y)`.
    pub fn value_at(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.grid
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }
}

impl std::fmt::Debug for ThermalFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThermalFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("unit", &self.unit)
            .field("sequence", &self.sequence)
            .field("capture_time_millis", &self.capture_time_millis)
            .field("cells", &self.grid.len())
            .finish()
    }
}

/// Visual-light image paired with a thermal frame.
///
/// Its resolution is usually different from the thermal grid.
#[derive(Clone)]
pub struct VisualFrame {
    image: RgbImage,
}

impl VisualFrame {
    /// Wraps a captured image.
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// The captured image.
    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Consumes the frame, returning its image.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for VisualFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualFrame")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Everything a sensor callback hands over for one capture.
#[derive(Debug, Clone)]
pub struct SensorCapture {
    /// Thermal grid.
    pub thermal: ThermalFrame,
    /// Paired visual image, when the sensor provides one.
    pub visual: Option<VisualFrame>,
}

impl SensorCapture {
    /// Bundles a thermal frame with its optional visual image.
    pub fn new(thermal: ThermalFrame, visual: Option<VisualFrame>) -> Self {
        Self { thermal, visual }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = ThermalFrame::new(vec![300.0; 80 * 60], 80, 60, 1_000);

        assert_eq!(frame.width(), 80);
        assert_eq!(frame.height(), 60);
        assert_eq!(frame.capture_time_millis(), 1_000);
        assert_eq!(frame.sequence(), 0);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let frame = ThermalFrame::new(vec![300.0; 100], 80, 60, 0);
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_value_at_row_major() {
        let grid: Vec<f64> = (0..12).map(f64::from).collect();
        let frame = ThermalFrame::new(grid, 4, 3, 0);

        assert_eq!(frame.value_at(0, 0), Some(0.0));
        assert_eq!(frame.value_at(3, 0), Some(3.0));
        assert_eq!(frame.value_at(1, 2), Some(9.0));
        assert_eq!(frame.value_at(4, 0), None);
    }

    #[test]
    fn test_with_grid_keeps_metadata() {
        let frame = ThermalFrame::new(vec![1.0; 4], 2, 2, 42)
            .with_unit(TemperatureUnit::Fahrenheit)
            .with_sequence(7);
        let replaced = frame.with_grid(vec![2.0; 4]);

        assert_eq!(replaced.grid(), &[2.0; 4]);
        assert_eq!(replaced.sequence(), 7);
        assert_eq!(replaced.unit(), TemperatureUnit::Fahrenheit);
        assert_eq!(replaced.capture_time_millis(), 42);
    }
}
