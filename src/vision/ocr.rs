//! OCR seam for reading HUD text
//!
//! The recognizer itself is pluggable; the bot ships without one and reads
//! empty text until an engine is wired in.

use image::DynamicImage;

use super::{OcrOptions, TextReading};

/// Text recognition engine
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text in an already-preprocessed image
    fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> TextReading;
}

/// Recognizer that never reads anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecognizer;

impl TextRecognizer for NullRecognizer {
    fn recognize(&self, _image: &DynamicImage, _options: &OcrOptions) -> TextReading {
        TextReading::default()
    }
}

/// Keep only characters allowed by the options' whitelist
pub fn apply_whitelist(text: &str, options: &OcrOptions) -> String {
    match options.whitelist {
        Some(allowed) => text.chars().filter(|c| allowed.contains(*c)).collect(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Segmentation;

    #[test]
    fn test_null_recognizer_reads_nothing() {
        let image = DynamicImage::new_luma8(4, 4);
        let reading = NullRecognizer.recognize(&image, &OcrOptions::default());
        assert!(reading.text.is_empty());
        assert_eq!(reading.confidence, 0.0);
    }

    #[test]
    fn test_whitelist_filters() {
        let options = OcrOptions::new(Segmentation::Line, Some("0123456789/"));
        assert_eq!(apply_whitelist(" 12 / 5O\n", &options), "12/5");
        assert_eq!(apply_whitelist("abc", &OcrOptions::default()), "abc");
    }
}
