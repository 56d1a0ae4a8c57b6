//! Persisted board statistics
//!
//! One JSON document per target window holds every board seen so far with
//! the upgrade costs observed for each building slot. The document is read
//! in full when a build cycle starts and rewritten in full when it ends.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Building slots on a board
pub const SLOT_COUNT: usize = 5;
/// Upgrade levels per building
pub const LEVEL_COUNT: usize = 6;

/// Board store errors
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt board data in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Observed upgrade costs of one board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardRecord {
    pub board_number: u32,
    pub board_name: String,
    pub building1: [u64; LEVEL_COUNT],
    pub building2: [u64; LEVEL_COUNT],
    pub building3: [u64; LEVEL_COUNT],
    pub building4: [u64; LEVEL_COUNT],
    pub building5: [u64; LEVEL_COUNT],
    #[serde(default)]
    pub total_cost: u64,
}

impl BoardRecord {
    pub fn new(board_number: u32, board_name: impl Into<String>) -> Self {
        Self {
            board_number,
            board_name: board_name.into(),
            building1: [0; LEVEL_COUNT],
            building2: [0; LEVEL_COUNT],
            building3: [0; LEVEL_COUNT],
            building4: [0; LEVEL_COUNT],
            building5: [0; LEVEL_COUNT],
            total_cost: 0,
        }
    }

    /// Upgrade costs of slot `index` (0-based)
    pub fn slot(&self, index: usize) -> Option<&[u64; LEVEL_COUNT]> {
        match index {
            0 => Some(&self.building1),
            1 => Some(&self.building2),
            2 => Some(&self.building3),
            3 => Some(&self.building4),
            4 => Some(&self.building5),
            _ => None,
        }
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut [u64; LEVEL_COUNT]> {
        match index {
            0 => Some(&mut self.building1),
            1 => Some(&mut self.building2),
            2 => Some(&mut self.building3),
            3 => Some(&mut self.building4),
            4 => Some(&mut self.building5),
            _ => None,
        }
    }

    fn recompute_total(&mut self) {
        self.total_cost = (0..SLOT_COUNT)
            .filter_map(|i| self.slot(i))
            .flat_map(|costs| costs.iter())
            .sum();
    }
}

/// Costs gathered during one build cycle, per slot and level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable {
    costs: [[u64; LEVEL_COUNT]; SLOT_COUNT],
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the cost seen for `slot` at upgrade `level`; unknown costs
    /// (zero) and out-of-range indices are ignored
    pub fn record(&mut self, slot: usize, level: usize, cost: u64) {
        if cost == 0 {
            return;
        }
        if let Some(entry) = self.costs.get_mut(slot).and_then(|s| s.get_mut(level)) {
            *entry = cost;
        }
    }

    /// Cost of upgrading `slot` to `level`, 0 when never read
    pub fn get(&self, slot: usize, level: usize) -> u64 {
        self.costs
            .get(slot)
            .and_then(|s| s.get(level))
            .copied()
            .unwrap_or(0)
    }

    /// True when no cost has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.costs.iter().flatten().all(|c| *c == 0)
    }
}

/// JSON-backed list of board records for one window
#[derive(Debug)]
pub struct BoardStore {
    path: PathBuf,
    boards: Vec<BoardRecord>,
}

impl BoardStore {
    /// File holding the records for `window_title` under `data_dir`
    pub fn file_for(data_dir: &Path, window_title: &str) -> PathBuf {
        data_dir.join(format!("{}_game_data.json", window_title.trim()))
    }

    /// Read the store; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BoardError> {
        let path = path.into();
        let boards = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| BoardError::Json {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No board data at {}, starting fresh", path.display());
                Vec::new()
            }
            Err(source) => {
                return Err(BoardError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        log::debug!("Loaded {} boards from {}", boards.len(), path.display());
        Ok(Self { path, boards })
    }

    /// All known boards in board-number order
    pub fn boards(&self) -> &[BoardRecord] {
        &self.boards
    }

    /// Look a board up by its display name
    pub fn get(&self, board_name: &str) -> Option<&BoardRecord> {
        self.boards.iter().find(|b| b.board_name == board_name)
    }

    /// Merge the costs of one cycle into the board named `board_name`,
    /// creating the board with the next free number if it is new
    pub fn record_costs(&mut self, board_name: &str, costs: &CostTable) -> &BoardRecord {
        let index = match self.boards.iter().position(|b| b.board_name == board_name) {
            Some(index) => index,
            None => {
                let last = self.boards.iter().map(|b| b.board_number).max();
                let number = last.unwrap_or(0) + 1;
                log::info!("New board #{}: {}", number, board_name);
                self.boards.push(BoardRecord::new(number, board_name));
                self.boards.len() - 1
            }
        };

        let board = &mut self.boards[index];
        for slot in 0..SLOT_COUNT {
            if let Some(levels) = board.slot_mut(slot) {
                for (level, entry) in levels.iter_mut().enumerate() {
                    let cost = costs.get(slot, level);
                    if cost > 0 {
                        *entry = cost;
                    }
                }
            }
        }
        board.recompute_total();
        board
    }

    /// Rewrite the whole document
    pub fn save(&self) -> Result<(), BoardError> {
        let io_err = |source| BoardError::Io {
            path: self.path.display().to_string(),
            source,
        };
        let json_err = |source| BoardError::Json {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.boards).map_err(json_err)?;
        std::fs::write(&self.path, json).map_err(io_err)?;
        log::debug!(
            "Saved {} boards to {}",
            self.boards.len(),
            self.path.display()
        );
        Ok(())
    }
}
