//! Image preprocessing ahead of OCR
//!
//! HUD text is small and drawn over busy artwork, so regions are upscaled,
//! converted to grayscale, and optionally binarized before recognition.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};

/// Preprocessing applied to a region before it is handed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocess {
    /// Convert to grayscale (implied by `threshold` and `invert`)
    pub grayscale: bool,
    /// Binarize at this luma value
    pub threshold: Option<u8>,
    /// Invert after thresholding (dark text on light background)
    pub invert: bool,
    /// Integer upscale factor; 1 leaves the size unchanged
    pub scale: u32,
}

impl Preprocess {
    pub const fn new(grayscale: bool, threshold: Option<u8>, invert: bool, scale: u32) -> Self {
        Self {
            grayscale,
            threshold,
            invert,
            scale,
        }
    }

    /// Grayscale only
    pub const fn gray() -> Self {
        Self::new(true, None, false, 1)
    }

    /// Upscale then binarize at `threshold`
    pub const fn binarized(threshold: u8, invert: bool, scale: u32) -> Self {
        Self::new(true, Some(threshold), invert, scale)
    }

    fn needs_gray(&self) -> bool {
        self.grayscale || self.threshold.is_some() || self.invert
    }

    /// Apply the preprocessing to a captured region
    pub fn apply(&self, region: &RgbaImage) -> DynamicImage {
        let scaled = if self.scale > 1 {
            let (width, height) = region.dimensions();
            imageops::resize(
                region,
                width * self.scale,
                height * self.scale,
                FilterType::Lanczos3,
            )
        } else {
            region.clone()
        };

        if !self.needs_gray() {
            return DynamicImage::ImageRgba8(scaled);
        }

        let mut gray: GrayImage = imageops::grayscale(&scaled);
        if let Some(threshold) = self.threshold {
            binarize(&mut gray, threshold);
        }
        if self.invert {
            imageops::invert(&mut gray);
        }
        DynamicImage::ImageLuma8(gray)
    }
}

impl Default for Preprocess {
    fn default() -> Self {
        Self::gray()
    }
}

/// Pixels strictly above `threshold` become white, the rest black
fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        *pixel = if pixel[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn split_image() -> RgbaImage {
        ImageBuffer::from_fn(4, 2, |x, _| {
            if x < 2 {
                Rgba([30, 30, 30, 255])
            } else {
                Rgba([220, 220, 220, 255])
            }
        })
    }

    #[test]
    fn test_binarize_and_invert() {
        let processed = Preprocess::binarized(100, true, 1).apply(&split_image());
        let gray = processed.to_luma8();
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn test_upscale() {
        let processed = Preprocess::binarized(100, false, 3).apply(&split_image());
        assert_eq!((processed.width(), processed.height()), (12, 6));
    }

    #[test]
    fn test_color_passthrough() {
        let processed = Preprocess::new(false, None, false, 1).apply(&split_image());
        assert!(matches!(processed, DynamicImage::ImageRgba8(_)));
    }
}
