//! Multi-scale template matching
//!
//! The emulator window is rarely at the exact size the templates were cut
//! at, so every lookup tries a small band of scale factors and keeps the
//! best normalized cross-correlation.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use super::{Template, VisionError};
use crate::geometry::{Point, Rect};

/// Default acceptance threshold for a match
pub const DEFAULT_THRESHOLD: f32 = 0.65;

/// Matches this close to a screen corner are discarded; the pointer parked
/// there would trip the input layer's fail-safe
pub const CORNER_MARGIN: i32 = 5;

/// Best match of a template in a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Matched area in frame coordinates
    pub rect: Rect,
    pub score: f32,
    pub scale: f32,
}

impl MatchResult {
    pub fn center(&self) -> Point {
        self.rect.center()
    }

    /// Overlay label for the debug view
    pub fn label(&self) -> String {
        format!(
            "Match ({}%) S:{:.2}",
            (self.score * 100.0) as u32,
            self.scale
        )
    }
}

/// Multi-scale normalized cross-correlation matcher
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    scales: Vec<f32>,
    threshold: f32,
}

impl TemplateMatcher {
    pub fn new(scales: Vec<f32>, threshold: f32) -> Self {
        Self { scales, threshold }
    }

    /// Best match across all scales, if it clears the threshold
    pub fn find(
        &self,
        frame: &GrayImage,
        template: &GrayImage,
        threshold: Option<f32>,
    ) -> Option<MatchResult> {
        let threshold = threshold.unwrap_or(self.threshold);
        let (frame_w, frame_h) = frame.dimensions();
        let (tmpl_w, tmpl_h) = template.dimensions();

        let mut best: Option<MatchResult> = None;
        for &scale in &self.scales {
            let width = (tmpl_w as f32 * scale) as u32;
            let height = (tmpl_h as f32 * scale) as u32;
            if width == 0 || height == 0 || width > frame_w || height > frame_h {
                continue;
            }

            let scaled;
            let candidate = if width == tmpl_w && height == tmpl_h {
                template
            } else {
                scaled = imageops::resize(template, width, height, FilterType::Triangle);
                &scaled
            };

            let scores = match_template(
                frame,
                candidate,
                MatchTemplateMethod::CrossCorrelationNormalized,
            );
            let extremes = find_extremes(&scores);
            let score = extremes.max_value;
            if score.is_nan() {
                continue;
            }

            if best.is_none_or(|b| score > b.score) {
                let (x, y) = extremes.max_value_location;
                best = Some(MatchResult {
                    rect: Rect::new(x as i32, y as i32, width, height),
                    score,
                    scale,
                });
            }
        }

        best.filter(|m| m.score >= threshold)
    }
}

impl Default for TemplateMatcher {
    /// Scales 0.80 through 1.20 in 0.04 steps
    fn default() -> Self {
        let scales = (0..=10).map(|i| 0.8 + 0.04 * i as f32).collect();
        Self::new(scales, DEFAULT_THRESHOLD)
    }
}

/// True when `point` lies within the fail-safe margin of a screen corner
pub fn near_corner(point: Point, screen: Rect) -> bool {
    let right = screen.x + screen.width as i32 - 1;
    let bottom = screen.y + screen.height as i32 - 1;
    let near_x =
        (point.x - screen.x).abs() <= CORNER_MARGIN || (right - point.x).abs() <= CORNER_MARGIN;
    let near_y =
        (point.y - screen.y).abs() <= CORNER_MARGIN || (bottom - point.y).abs() <= CORNER_MARGIN;
    near_x && near_y
}

/// Lazily loaded, cached grayscale templates
pub struct TemplateLibrary {
    dir: PathBuf,
    cache: Mutex<HashMap<Template, Arc<GrayImage>>>,
    reported_missing: Mutex<HashSet<Template>>,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
            reported_missing: Mutex::new(HashSet::new()),
        }
    }

    /// Load `template` as grayscale, caching it for later lookups
    pub fn get(&self, template: &Template) -> Result<Arc<GrayImage>, VisionError> {
        if let Some(image) = self.cache.lock().get(template) {
            return Ok(Arc::clone(image));
        }

        let path = self.dir.join(template.file_name());
        let image = image::open(&path)
            .map_err(|source| VisionError::ImageLoad {
                path: path.display().to_string(),
                source,
            })?
            .to_luma8();
        let image = Arc::new(image);
        self.cache
            .lock()
            .insert(template.clone(), Arc::clone(&image));
        Ok(image)
    }

    /// Like [`get`](Self::get) but logs a failure once per template
    pub fn get_or_warn(&self, template: &Template) -> Option<Arc<GrayImage>> {
        match self.get(template) {
            Ok(image) => Some(image),
            Err(e) => {
                if self.reported_missing.lock().insert(template.clone()) {
                    log::warn!("Template unavailable: {}", e);
                }
                None
            }
        }
    }

    /// All popup-dismissal templates in the `ui/` directory, in name order
    pub fn ui_templates(&self) -> Vec<Template> {
        let ui_dir = self.dir.join("ui");
        let entries = match std::fs::read_dir(&ui_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("No UI templates in {}: {}", ui_dir.display(), e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names.into_iter().map(Template::Ui).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Dim background with a bright plus sign centred at (40, 25)
    fn frame_with_marker() -> GrayImage {
        GrayImage::from_fn(80, 50, |x, y| {
            let on_bar = (x as i32 - 40).abs() <= 1 && (y as i32 - 25).abs() <= 5
                || (y as i32 - 25).abs() <= 1 && (x as i32 - 40).abs() <= 5;
            if on_bar {
                Luma([250])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn test_finds_exact_crop() {
        let frame = frame_with_marker();
        let template = imageops::crop_imm(&frame, 33, 18, 15, 15).to_image();

        let matcher = TemplateMatcher::default();
        let result = matcher.find(&frame, &template, None).unwrap();
        assert!(result.score > 0.95);
        let center = result.center();
        assert!((center.x - 40).abs() <= 2, "{:?}", result);
        assert!((center.y - 25).abs() <= 2, "{:?}", result);
    }

    #[test]
    fn test_threshold_rejects_weak_match() {
        let frame = GrayImage::from_pixel(40, 40, Luma([20]));
        let template = imageops::crop_imm(&frame_with_marker(), 33, 18, 15, 15).to_image();

        let matcher = TemplateMatcher::new(vec![1.0], 0.99);
        assert!(matcher.find(&frame, &template, None).is_none());
    }

    #[test]
    fn test_oversized_template_skipped() {
        let frame = GrayImage::from_pixel(10, 10, Luma([20]));
        let template = GrayImage::from_pixel(20, 20, Luma([20]));
        let matcher = TemplateMatcher::default();
        assert!(matcher.find(&frame, &template, None).is_none());
    }

    #[test]
    fn test_near_corner() {
        let screen = Rect::new(0, 0, 1920, 1080);
        assert!(near_corner(Point::new(2, 3), screen));
        assert!(near_corner(Point::new(1917, 1078), screen));
        assert!(!near_corner(Point::new(2, 500), screen));
        assert!(!near_corner(Point::new(960, 540), screen));
    }

    #[test]
    fn test_label_format() {
        let result = MatchResult {
            rect: Rect::new(0, 0, 10, 10),
            score: 0.874,
            scale: 1.0,
        };
        assert_eq!(result.label(), "Match (87%) S:1.00");
    }

    #[test]
    fn test_library_caches_and_lists_ui() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ui")).unwrap();
        let pixel = GrayImage::from_pixel(3, 3, Luma([9]));
        pixel.save(dir.path().join("go.png")).unwrap();
        pixel.save(dir.path().join("ui").join("close.png")).unwrap();

        let library = TemplateLibrary::new(dir.path());
        let first = library.get(&Template::Go).unwrap();
        let second = library.get(&Template::Go).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(library.get_or_warn(&Template::Target).is_none());
        assert_eq!(
            library.ui_templates(),
            vec![Template::Ui("close.png".to_string())]
        );
    }
}
