//! Screen capture handling
//!
//! Holds the most recent window frame and the sources frames come from.
//! Frames are indexed relative to the window's own origin.

use image::RgbaImage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use super::VisionError;
use crate::geometry::Rect;

/// Anything that can produce a capture of the target window
pub trait FrameSource: Send + Sync {
    /// Grab the current frame; `None` when nothing could be captured
    fn next_frame(&self) -> Option<RgbaImage>;
}

/// Source used when no capture backend is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl FrameSource for NoCapture {
    fn next_frame(&self) -> Option<RgbaImage> {
        None
    }
}

/// Replays PNG frames from a directory in name order, looping forever
pub struct FrameDirSource {
    frames: Vec<PathBuf>,
    cursor: Mutex<usize>,
}

impl FrameDirSource {
    /// Collect the PNG frames in `dir`, sorted by file name
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, VisionError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| VisionError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(VisionError::NoFrames(dir.display().to_string()));
        }
        log::info!("Replaying {} frames from {}", frames.len(), dir.display());

        Ok(Self {
            frames,
            cursor: Mutex::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameDirSource {
    fn next_frame(&self) -> Option<RgbaImage> {
        let path = {
            let mut cursor = self.cursor.lock();
            let path = &self.frames[*cursor % self.frames.len()];
            *cursor = (*cursor + 1) % self.frames.len();
            path.clone()
        };

        match image::open(&path) {
            Ok(frame) => Some(frame.to_rgba8()),
            Err(e) => {
                log::warn!("Failed to read frame {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Most recent capture of the target window
pub struct ScreenCapture {
    current_frame: Option<RgbaImage>,
    frame_count: u64,
}

impl ScreenCapture {
    pub fn new() -> Self {
        Self {
            current_frame: None,
            frame_count: 0,
        }
    }

    /// Replace the current frame
    pub fn set_frame(&mut self, frame: RgbaImage) {
        self.current_frame = Some(frame);
        self.frame_count += 1;
    }

    pub fn current_frame(&self) -> Option<&RgbaImage> {
        self.current_frame.as_ref()
    }

    /// Frames stored since creation
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Crop a region of the current frame, clamped to the frame bounds
    pub fn extract_region(&self, rect: Rect) -> Option<RgbaImage> {
        let frame = self.current_frame.as_ref()?;
        let (frame_w, frame_h) = frame.dimensions();

        let x = rect.x.max(0) as u32;
        let y = rect.y.max(0) as u32;
        if x >= frame_w || y >= frame_h {
            return None;
        }
        let width = rect.width.min(frame_w - x);
        let height = rect.height.min(frame_h - y);
        if width == 0 || height == 0 {
            return None;
        }

        Some(image::imageops::crop_imm(frame, x, y, width, height).to_image())
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}
