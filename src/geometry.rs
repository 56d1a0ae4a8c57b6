//! Screen geometry
//!
//! Points, pixel rectangles, and window-relative percentage regions. Every
//! region the bot reads or clicks is expressed as a percentage of the target
//! window so it survives emulator resizes.

use serde::{Deserialize, Serialize};

/// Absolute screen position in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by `(dx, dy)`
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Pixel rectangle (top-left corner plus size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center of the rectangle
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }
}

/// Region expressed as percentages of the window's bounding box
/// (left%, top%, right%, bottom%)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionPct {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RegionPct {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a region from a left/top corner plus a width/height in percent
    pub const fn from_size(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    /// Width as a fraction of the window
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height as a fraction of the window
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Resolve to an absolute pixel rectangle inside the window
    pub fn to_rect(&self, window: &WindowGeometry) -> Rect {
        let left = window.pct_x(self.left);
        let top = window.pct_y(self.top);
        let right = window.pct_x(self.right);
        let bottom = window.pct_y(self.bottom);
        Rect::new(
            left,
            top,
            (right - left).max(0) as u32,
            (bottom - top).max(0) as u32,
        )
    }

    /// Resolve to a pixel rectangle relative to the window's own origin,
    /// which is how a captured window frame is indexed
    pub fn to_frame_rect(&self, window: &WindowGeometry) -> Rect {
        let rect = self.to_rect(window);
        Rect::new(
            rect.x - window.x,
            rect.y - window.y,
            rect.width,
            rect.height,
        )
    }

    /// Absolute center point of the region
    pub fn center(&self, window: &WindowGeometry) -> Point {
        Point::new(
            window.pct_x((self.left + self.right) / 2.0),
            window.pct_y((self.top + self.bottom) / 2.0),
        )
    }

    /// Split the region into a `cols` x `rows` grid and return the absolute
    /// center of cell `index` (row-major)
    pub fn grid_cell_center(
        &self,
        window: &WindowGeometry,
        cols: u32,
        rows: u32,
        index: u32,
    ) -> Option<Point> {
        if cols == 0 || rows == 0 || index >= cols * rows {
            return None;
        }

        let col = index % cols;
        let row = index / cols;
        let cell_w = self.width() / cols as f32;
        let cell_h = self.height() / rows as f32;

        let x_pct = self.left + cell_w * (col as f32 + 0.5);
        let y_pct = self.top + cell_h * (row as f32 + 0.5);

        Some(Point::new(window.pct_x(x_pct), window.pct_y(y_pct)))
    }
}

/// Position and size of the emulator window on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowGeometry {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Absolute X coordinate of a horizontal percentage
    pub fn pct_x(&self, percent: f32) -> i32 {
        self.x + (self.width as f32 * percent / 100.0) as i32
    }

    /// Absolute Y coordinate of a vertical percentage
    pub fn pct_y(&self, percent: f32) -> i32 {
        self.y + (self.height as f32 * percent / 100.0) as i32
    }

    /// Absolute center of the window, used as the pointer parking spot
    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    /// Window bounds as a rectangle
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self::new(0, 0, 1920, 1080)
    }
}

/// Looks up a window's geometry by title
pub trait WindowLocator: Send + Sync {
    fn find(&self, title: &str) -> Option<WindowGeometry>;
}

/// Locator backed by a fixed geometry from configuration
pub struct FixedWindow(pub Option<WindowGeometry>);

impl WindowLocator for FixedWindow {
    fn find(&self, _title: &str) -> Option<WindowGeometry> {
        self.0
    }
}

/// Resolve the target window, degrading to `fallback` when the window cannot
/// be found
pub fn resolve_window(
    locator: &dyn WindowLocator,
    title: &str,
    fallback: WindowGeometry,
) -> WindowGeometry {
    match locator.find(title) {
        Some(geometry) => {
            log::info!("Target window '{}' at {:?}", title, geometry);
            geometry
        }
        None => {
            log::error!(
                "Window '{}' not found, falling back to {:?}; window-relative actions will be wrong",
                title,
                fallback
            );
            fallback
        }
    }
}
