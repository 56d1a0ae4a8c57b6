//! Frame-based perception
//!
//! Implements [`Perception`] on top of a [`FrameSource`]: each call grabs a
//! fresh frame of the window, then either runs the multi-scale matcher or
//! crops, preprocesses, and recognizes a region.

use parking_lot::Mutex;
use std::sync::Arc;

use super::capture::{FrameSource, ScreenCapture};
use super::matcher::{near_corner, TemplateLibrary, TemplateMatcher};
use super::ocr::{apply_whitelist, TextRecognizer};
use super::{OcrOptions, Perception, Preprocess, Template, TextReading};
use crate::geometry::{Point, Rect, RegionPct, WindowGeometry};
use crate::state::{OverlayShape, Overlays};

pub struct FramePerception {
    source: Box<dyn FrameSource>,
    capture: Mutex<ScreenCapture>,
    matcher: TemplateMatcher,
    library: TemplateLibrary,
    recognizer: Box<dyn TextRecognizer>,
    window: WindowGeometry,
    /// Primary screen, for the fail-safe corner check
    screen: Rect,
    overlays: Arc<Overlays>,
}

impl FramePerception {
    pub fn new(
        source: Box<dyn FrameSource>,
        library: TemplateLibrary,
        recognizer: Box<dyn TextRecognizer>,
        window: WindowGeometry,
        overlays: Arc<Overlays>,
    ) -> Self {
        Self {
            source,
            capture: Mutex::new(ScreenCapture::new()),
            matcher: TemplateMatcher::default(),
            library,
            recognizer,
            window,
            screen: window.bounds(),
            overlays,
        }
    }

    /// Use a different primary-screen rectangle for the corner check
    pub fn with_screen(mut self, screen: Rect) -> Self {
        self.screen = screen;
        self
    }

    /// Capture a new frame, keeping the previous one if the grab fails
    fn refresh(&self) -> parking_lot::MutexGuard<'_, ScreenCapture> {
        let frame = self.source.next_frame();
        let mut capture = self.capture.lock();
        match frame {
            Some(frame) => capture.set_frame(frame),
            None => {
                let count = capture.frame_count();
                log::trace!("Frame grab failed, reusing frame #{}", count);
            }
        }
        capture
    }
}

impl Perception for FramePerception {
    fn locate(&self, template: &Template) -> Option<Point> {
        let template_image = self.library.get_or_warn(template)?;
        let frame = {
            let capture = self.refresh();
            image::imageops::grayscale(capture.current_frame()?)
        };

        let found = self.matcher.find(&frame, &template_image, template.threshold())?;
        let origin = Point::new(found.rect.x, found.rect.y).offset(self.window.x, self.window.y);
        let rect = Rect::new(origin.x, origin.y, found.rect.width, found.rect.height);
        let center = rect.center();

        if near_corner(center, self.screen) {
            log::debug!(
                "Ignoring {:?} match at screen corner {:?}",
                template,
                center
            );
            return None;
        }

        log::debug!("Found {:?} at {:?} ({})", template, center, found.label());
        self.overlays.push(OverlayShape::Rect(rect), found.label());
        Some(center)
    }

    fn recognize(
        &self,
        region: RegionPct,
        options: &OcrOptions,
        preprocess: &Preprocess,
    ) -> TextReading {
        let crop = {
            let capture = self.refresh();
            capture.extract_region(region.to_frame_rect(&self.window))
        };
        let Some(crop) = crop else {
            return TextReading::default();
        };

        let processed = preprocess.apply(&crop);
        let mut reading = self.recognizer.recognize(&processed, options);
        reading.text = apply_whitelist(&reading.text, options);
        reading
    }

    fn ui_templates(&self) -> Vec<Template> {
        self.library.ui_templates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, RgbaImage};

    struct StillFrame(RgbaImage);

    impl FrameSource for StillFrame {
        fn next_frame(&self) -> Option<RgbaImage> {
            Some(self.0.clone())
        }
    }

    struct SizeRecognizer;

    impl TextRecognizer for SizeRecognizer {
        fn recognize(&self, image: &DynamicImage, _options: &OcrOptions) -> TextReading {
            TextReading {
                text: format!("{}x{}", image.width(), image.height()),
                confidence: 90.0,
            }
        }
    }

    fn marker_frame() -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| {
            let on_bar = (x as i32 - 60).abs() <= 1 && (y as i32 - 50).abs() <= 5
                || (y as i32 - 50).abs() <= 1 && (x as i32 - 60).abs() <= 5;
            Luma([if on_bar { 250 } else { 20 }])
        })
    }

    fn perception(dir: &std::path::Path, overlays: Arc<Overlays>) -> FramePerception {
        let frame = DynamicImage::ImageLuma8(marker_frame()).to_rgba8();
        FramePerception::new(
            Box::new(StillFrame(frame)),
            TemplateLibrary::new(dir),
            Box::new(SizeRecognizer),
            WindowGeometry::new(200, 100, 100, 100),
            overlays,
        )
        .with_screen(Rect::new(0, 0, 1920, 1080))
    }

    #[test]
    fn test_locate_returns_absolute_center() {
        let dir = tempfile::tempdir().unwrap();
        image::imageops::crop_imm(&marker_frame(), 53, 43, 15, 15)
            .to_image()
            .save(dir.path().join("go.png"))
            .unwrap();

        let overlays = Arc::new(Overlays::default());
        let perception = perception(dir.path(), Arc::clone(&overlays));

        let point = perception.locate(&Template::Go).unwrap();
        assert!((point.x - 260).abs() <= 2, "{:?}", point);
        assert!((point.y - 150).abs() <= 2, "{:?}", point);
        assert_eq!(overlays.snapshot().len(), 1);
    }

    #[test]
    fn test_missing_template_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let perception = perception(dir.path(), Arc::new(Overlays::default()));
        assert!(perception.locate(&Template::Target).is_none());
    }

    #[test]
    fn test_recognize_crops_region() {
        let dir = tempfile::tempdir().unwrap();
        let perception = perception(dir.path(), Arc::new(Overlays::default()));

        let reading = perception.recognize(
            RegionPct::new(10.0, 10.0, 30.0, 20.0),
            &OcrOptions::default(),
            &Preprocess::binarized(100, false, 2),
        );
        assert_eq!(reading.text, "40x20");
        assert_eq!(reading.confidence, 90.0);
    }
}
