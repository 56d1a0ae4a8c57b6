//! Screen layout of the game
//!
//! Every region is a percentage of the emulator window (left, top, right,
//! bottom), paired with the OCR settings that read it best.

use crate::geometry::RegionPct;
use crate::vision::{OcrOptions, Preprocess, Segmentation};

pub const MONEY: RegionPct = RegionPct::new(33.5, 5.0, 62.0, 9.0);
pub const MONEY_OCR: OcrOptions = OcrOptions::new(Segmentation::Line, Some("0123456789,"));
pub const MONEY_PREPROCESS: Preprocess = Preprocess::gray();

pub const ROLLS: RegionPct = RegionPct::new(43.0, 92.0, 57.0, 94.5);
pub const ROLLS_OCR: OcrOptions = OcrOptions::new(Segmentation::Block, Some("0123456789/"));
pub const ROLLS_PREPROCESS: Preprocess = Preprocess::binarized(100, true, 3);

pub const MULTIPLIER: RegionPct = RegionPct::new(53.0, 70.0, 57.0, 73.0);
pub const MULTIPLIER_OCR: OcrOptions = OcrOptions::new(Segmentation::Line, Some("x0123456789"));
pub const MULTIPLIER_PREPROCESS: Preprocess = Preprocess::new(true, None, false, 3);

/// "MAX" label shown once the multiplier cannot go higher
pub const MULTIPLIER_MAX: RegionPct = RegionPct::new(61.06, 57.29, 74.04, 61.28);
pub const MULTIPLIER_MAX_OCR: OcrOptions = OcrOptions::new(Segmentation::Block, None);

/// Multiplier increment control; clicked at its center
pub const MULTIPLIER_BUTTON: RegionPct = RegionPct::new(61.0, 70.5, 71.0, 73.3);

pub const BOARD_NAME: RegionPct = RegionPct::new(1.0, 91.7, 94.9, 95.0);
pub const BOARD_NAME_OCR: OcrOptions = OcrOptions::new(
    Segmentation::Line,
    Some("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789/ "),
);
pub const BOARD_NAME_PREPROCESS: Preprocess = Preprocess::binarized(75, false, 4);

/// Upgrade cost label of each building slot in the build menu
pub const BUILDING_SLOTS: [RegionPct; 5] = [
    RegionPct::new(37.0, 86.0, 40.5, 91.0),
    RegionPct::new(42.5, 86.0, 46.0, 91.0),
    RegionPct::new(48.5, 86.0, 52.0, 91.0),
    RegionPct::new(54.5, 86.0, 58.0, 91.0),
    RegionPct::new(60.5, 86.0, 64.0, 91.0),
];
pub const COST_OCR: OcrOptions = OcrOptions::new(Segmentation::Line, Some("0123456789.MK"));
pub const COST_PREPROCESS: Preprocess = Preprocess::binarized(100, true, 3);

/// Close "x" of dialogs that have no recognizable template
pub const POPUP_CLOSE: RegionPct = RegionPct::from_size(45.89, 93.81, 8.41, 4.79);
pub const POPUP_CLOSE_OCR: OcrOptions = OcrOptions::new(Segmentation::Char, None);

/// "Time until refill" countdown shown when dice run out
pub const REFILL_COUNTDOWN: RegionPct = RegionPct::new(43.0, 94.5, 57.0, 97.0);
pub const REFILL_OCR: OcrOptions = OcrOptions::new(Segmentation::Line, None);

/// Banner announcing an active bank heist
pub const HEIST_BANNER: RegionPct = RegionPct::new(30.0, 10.0, 70.0, 18.0);
pub const HEIST_BANNER_OCR: OcrOptions = OcrOptions::new(Segmentation::Line, None);
/// Minimum recognizer confidence before trusting the banner
pub const HEIST_BANNER_CONFIDENCE: f32 = 80.0;

/// Vault grid in the lower part of the window during a heist
pub const HEIST_GRID: RegionPct = RegionPct::new(10.0, 55.0, 90.0, 90.0);
pub const HEIST_GRID_COLS: u32 = 4;
pub const HEIST_GRID_ROWS: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::WindowGeometry;

    #[test]
    fn test_slots_are_ordered_and_disjoint() {
        for pair in BUILDING_SLOTS.windows(2) {
            assert!(pair[0].right < pair[1].left);
        }
    }

    #[test]
    fn test_popup_close_center() {
        let window = WindowGeometry::new(0, 0, 1000, 1000);
        let center = POPUP_CLOSE.center(&window);
        assert_eq!(center.x, 500);
        assert_eq!(center.y, 962);
    }
}
