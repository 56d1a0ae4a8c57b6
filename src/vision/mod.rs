//! Vision and image processing module
//!
//! Wraps frame capture, template matching, and OCR into the two primitives
//! every handler consumes: locate a template on screen, and read the text
//! inside a window-relative region.

pub mod capture;
pub mod matcher;
pub mod ocr;
pub mod perception;
pub mod preprocess;

use crate::geometry::{Point, RegionPct};

pub use capture::{FrameDirSource, FrameSource, NoCapture, ScreenCapture};
pub use matcher::{MatchResult, TemplateLibrary, TemplateMatcher};
pub use ocr::{NullRecognizer, TextRecognizer};
pub use perception::FramePerception;
pub use preprocess::Preprocess;

/// Images the bot looks for on screen
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Template {
    /// Roll trigger ("GO")
    Go,
    /// Indicator shown while a roll is animating
    Rolling,
    /// Build menu entry
    Build,
    /// Build menu exit, used as the "menu open" proxy
    BuildExit,
    /// Bank heist vault door
    BankHeistDoor,
    /// Destruction reticle
    Target,
    /// "Stop rolling" control shown while autoroll is engaged
    StopAutoroll,
    /// Popup dismissal control, by file name under `ui/`
    Ui(String),
}

impl Template {
    /// Path of the template image relative to the template directory
    pub fn file_name(&self) -> String {
        match self {
            Template::Go => "go.png".to_string(),
            Template::Rolling => "autoroll.png".to_string(),
            Template::Build => "build.png".to_string(),
            Template::BuildExit => "build_exit.png".to_string(),
            Template::BankHeistDoor => "bank-heist-door.png".to_string(),
            Template::Target => "target.png".to_string(),
            Template::StopAutoroll => "stop_autoroll.png".to_string(),
            Template::Ui(name) => format!("ui/{}", name),
        }
    }

    /// Match threshold override for this template
    pub fn threshold(&self) -> Option<f32> {
        match self {
            Template::Target => Some(0.5),
            _ => None,
        }
    }
}

/// Page layout hint passed to the text recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Segmentation {
    /// A uniform block of text
    #[default]
    Block,
    /// A single line
    Line,
    /// A single character
    Char,
}

/// Recognizer options for one read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOptions {
    pub segmentation: Segmentation,
    /// Restrict output to these characters
    pub whitelist: Option<&'static str>,
}

impl OcrOptions {
    pub const fn new(segmentation: Segmentation, whitelist: Option<&'static str>) -> Self {
        Self {
            segmentation,
            whitelist,
        }
    }
}

/// Text read from a region with the recognizer's confidence (0.0 - 100.0)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextReading {
    pub text: String,
    pub confidence: f32,
}

/// Screen perception consumed by every handler
///
/// Neither call ever fails: a miss is `None` or empty text, and callers
/// treat it as "retry later".
pub trait Perception: Send + Sync {
    /// Find a template on screen; returns the absolute center of the best
    /// match above threshold
    fn locate(&self, template: &Template) -> Option<Point>;

    /// Read text inside a window-relative region
    fn recognize(
        &self,
        region: RegionPct,
        options: &OcrOptions,
        preprocess: &Preprocess,
    ) -> TextReading;

    fn read_text(
        &self,
        region: RegionPct,
        options: &OcrOptions,
        preprocess: &Preprocess,
    ) -> String {
        self.recognize(region, options, preprocess).text
    }

    /// Every popup-dismissal template available
    fn ui_templates(&self) -> Vec<Template> {
        Vec::new()
    }
}

/// Vision system errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Failed to list {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No frames found in {0}")]
    NoFrames(String),
}
