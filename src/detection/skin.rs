//! Skin-tone face heuristic.
//!
//! Not a real face detector: it reports the bounding box of all
//! skin-coloured pixels, scored by how densely they fill that box.
//! Good enough to drive the overlay path with the emulator.

use super::{DetectedFace, DetectionError, FaceDetector};
use crate::geometry::DisplayRect;
use image::{Rgb, RgbImage};

/// Bounding-box detector over skin-toned pixels.
#[derive(Debug, Clone, Copy)]
pub struct SkinToneDetector {
    /// Minimum number of skin pixels before anything is reported.
    pub min_pixels: usize,
}

impl Default for SkinToneDetector {
    fn default() -> Self {
        Self { min_pixels: 64 }
    }
}

impl SkinToneDetector {
    /// Detector that ignores blobs under `min_pixels` pixels.
    pub fn new(min_pixels: usize) -> Self {
        Self { min_pixels }
    }

    /// RGB skin rule for uniform daylight illumination.
    #[inline]
    pub fn is_skin(pixel: &Rgb<u8>) -> bool {
        let [r, g, b] = pixel.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        r > 95 && g > 40 && b > 20 && max - min > 15 && r.abs_diff(g) > 15 && r > g && r > b
    }
}

impl FaceDetector for SkinToneDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectedFace>, DetectionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectionError::InvalidImage("empty image".into()));
        }

        let mut count = 0usize;
        let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
        for (x, y, pixel) in image.enumerate_pixels() {
            if Self::is_skin(pixel) {
                count += 1;
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }

        if count < self.min_pixels.max(1) {
            return Ok(Vec::new());
        }

        let width = f64::from(x1 - x0 + 1);
        let height = f64::from(y1 - y0 + 1);
        let fill = count as f64 / (width * height);
        Ok(vec![DetectedFace {
            rect: DisplayRect::new(f64::from(x0), f64::from(y0), width, height),
            confidence: fill as f32,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIN: Rgb<u8> = Rgb([224, 172, 138]);
    const WALL: Rgb<u8> = Rgb([40, 40, 90]);

    #[test]
    fn test_skin_rule() {
        assert!(SkinToneDetector::is_skin(&SKIN));
        assert!(!SkinToneDetector::is_skin(&WALL));
        assert!(!SkinToneDetector::is_skin(&Rgb([200, 200, 200])));
    }

    #[test]
    fn test_detects_patch_bounds() {
        let image = RgbImage::from_fn(100, 80, |x, y| {
            if (20..40).contains(&x) && (10..50).contains(&y) {
                SKIN
            } else {
                WALL
            }
        });
        let faces = SkinToneDetector::default().detect(&image).unwrap();

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].rect, DisplayRect::new(20.0, 10.0, 20.0, 40.0));
        assert!((faces[0].confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_skin_no_faces() {
        let image = RgbImage::from_pixel(50, 50, WALL);
        let faces = SkinToneDetector::default().detect(&image).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn test_empty_image_rejected() {
        let detector = SkinToneDetector::default();
        assert!(detector.detect(&RgbImage::new(0, 0)).is_err());
    }
}
