//! Thermal grid to display bitmap.

use crate::capture::ThermalFrame;
use crate::geometry::Dimensions;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use thiserror::Error;

/// Rendering errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Grid size does not match the frame dimensions.
    #[error("frame grid does not match its {width}x{height} dimensions")]
    InvalidFrame {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },
    /// The display has no pixels.
    #[error("display dimensions are empty")]
    EmptyDisplay,
}

/// Turns a calibrated frame into the base image shown on the display.
pub trait FrameRenderer: Send + Sync {
    /// Renders `frame` as an image of the display size.
    fn render(&self, frame: &ThermalFrame, display: Dimensions) -> Result<RgbImage, RenderError>;
}

/// Grayscale rendering normalized to the frame's own min..max,
/// upscaled nearest-neighbour so each sensor cell stays a crisp block.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrayscaleRenderer;

impl FrameRenderer for GrayscaleRenderer {
    fn render(&self, frame: &ThermalFrame, display: Dimensions) -> Result<RgbImage, RenderError> {
        if !frame.is_valid() {
            return Err(RenderError::InvalidFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }
        if display.is_empty() {
            return Err(RenderError::EmptyDisplay);
        }

        let (lo, hi) = frame
            .grid()
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let span = if hi > lo { hi - lo } else { 1.0 };

        let width = frame.width();
        let grid = frame.grid();
        let native = RgbImage::from_fn(width, frame.height(), |x, y| {
            let value = grid[y as usize * width as usize + x as usize];
            let level = if value.is_finite() {
                ((value - lo) / span * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            };
            Rgb([level, level, level])
        });

        if native.dimensions() == (display.width, display.height) {
            return Ok(native);
        }
        Ok(imageops::resize(
            &native,
            display.width,
            display.height,
            FilterType::Nearest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_levels() {
        let frame = ThermalFrame::new(vec![300.0, 310.0, 305.0, 300.0], 2, 2, 0);
        let image = GrayscaleRenderer
            .render(&frame, Dimensions::new(2, 2))
            .unwrap();
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 0), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(0, 1), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_upscaled_to_display() {
        let frame = ThermalFrame::new(vec![300.0, 310.0, 305.0, 300.0], 2, 2, 0);
        let image = GrayscaleRenderer
            .render(&frame, Dimensions::new(8, 6))
            .unwrap();
        assert_eq!(image.dimensions(), (8, 6));
        assert_eq!(*image.get_pixel(0, 0), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(7, 0), Rgb([255, 255, 255]));
    }

    #[test]
    fn test_constant_frame_renders() {
        let frame = ThermalFrame::new(vec![300.0; 4], 2, 2, 0);
        assert!(GrayscaleRenderer.render(&frame, Dimensions::new(4, 4)).is_ok());
    }

    #[test]
    fn test_invalid_frame_rejected() {
        let frame = ThermalFrame::new(vec![300.0; 3], 2, 2, 0);
        assert!(matches!(
            GrayscaleRenderer.render(&frame, Dimensions::new(4, 4)),
            Err(RenderError::InvalidFrame { .. })
        ));
    }
}
