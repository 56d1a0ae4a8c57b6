//! Bot settings
//!
//! Defines all configurable options for the automation. Settings are read
//! from an optional JSON file and then overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::ConfigError;
use crate::geometry::WindowGeometry;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Target window
    pub window: WindowSettings,
    /// Autoroll handler and monitor tuning
    pub autoroll: AutorollSettings,
    /// Building handler and monitor tuning
    pub building: BuildingSettings,
    /// Multiplier handler tuning
    pub multiplier: MultiplierSettings,
    /// Input dispatch settings
    pub input: InputSettings,
    /// Loop intervals and waits
    pub timings: Timings,
    /// Directory holding the per-window board records
    pub data_dir: PathBuf,
    /// Directory holding template images
    pub template_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            autoroll: AutorollSettings::default(),
            building: BuildingSettings::default(),
            multiplier: MultiplierSettings::default(),
            input: InputSettings::default(),
            timings: Timings::default(),
            data_dir: PathBuf::from("data"),
            template_dir: PathBuf::from("images"),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(title) = lookup("DICEBOT_WINDOW_TITLE") {
            self.window.title = title;
        }
        if let Some(value) = lookup("DICEBOT_MIN_ROLLS") {
            self.autoroll.minimum_rolls = parse_env("DICEBOT_MIN_ROLLS", value)?;
        }
        if let Some(value) = lookup("DICEBOT_RESUME_ROLLS") {
            self.autoroll.resume_rolls = parse_env("DICEBOT_RESUME_ROLLS", value)?;
        }
        Ok(())
    }

    /// Settings with every wait shortened, for driving loops in tests
    pub fn fast() -> Self {
        Self {
            timings: Timings::fast(),
            autoroll: AutorollSettings {
                hold_ms: 1,
                ..Default::default()
            },
            building: BuildingSettings {
                replenish_wait_ms: 200,
                ..Default::default()
            },
            multiplier: MultiplierSettings {
                timeout_ms: 200,
                ..Default::default()
            },
            input: InputSettings {
                lock_timeout_ms: 200,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parse_env(name: &'static str, value: String) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

/// Target window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Title of the emulator window
    pub title: String,
    /// Known geometry of the window, when it is not looked up by title
    pub geometry: Option<WindowGeometry>,
    /// Geometry used when the window cannot be found
    pub fallback: WindowGeometry,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "BlueStacks App Player".to_string(),
            geometry: None,
            fallback: WindowGeometry::default(),
        }
    }
}

/// Autoroll tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutorollSettings {
    /// Consecutive popups taken as "out of dice"
    pub popup_streak: u32,
    /// Press-and-hold duration on the roll control (ms)
    pub hold_ms: u64,
    /// Autoroll stops below this many rolls (never below 1)
    pub minimum_rolls: u32,
    /// Rolls needed before resuming after a build cycle (never below 1)
    pub resume_rolls: u32,
}

impl Default for AutorollSettings {
    fn default() -> Self {
        Self {
            popup_streak: 3,
            hold_ms: 1000,
            minimum_rolls: 0,
            resume_rolls: 0,
        }
    }
}

impl AutorollSettings {
    /// Roll count below which autorolling stops, at least 1
    pub fn stop_below(&self) -> u32 {
        self.minimum_rolls.max(1)
    }

    /// Roll count needed before rolling resumes, at least 1
    pub fn resume_at(&self) -> u32 {
        self.resume_rolls.max(1)
    }
}

/// Building tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingSettings {
    /// Money needed before a build cycle starts
    pub minimum_money: u64,
    /// Consecutive popups taken as "out of money"
    pub popup_streak: u32,
    /// Upper bound on the post-cycle wait for dice (ms)
    pub replenish_wait_ms: u64,
}

impl Default for BuildingSettings {
    fn default() -> Self {
        Self {
            minimum_money: 1000,
            popup_streak: 3,
            replenish_wait_ms: 30 * 60 * 1000,
        }
    }
}

/// Multiplier tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplierSettings {
    /// Multiplier the monitor tries to reach
    pub target: u32,
    /// Give up after this long (ms)
    pub timeout_ms: u64,
}

impl Default for MultiplierSettings {
    fn default() -> Self {
        Self {
            target: 2,
            timeout_ms: 30_000,
        }
    }
}

/// Input dispatch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Lock file shared by every bot process on the machine
    pub lock_file: Option<PathBuf>,
    /// How long to wait for the cross-process lock (ms)
    pub lock_timeout_ms: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            lock_file: Some(std::env::temp_dir().join("dicebot_input.lock")),
            lock_timeout_ms: 10_000,
        }
    }
}

/// Loop intervals and waits, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Sampler polling interval
    pub sample_ms: u64,
    /// Pause after a build or multiplier cycle before re-evaluating
    pub debounce_ms: u64,
    /// Monitor poll while values are unknown or nothing to do
    pub monitor_idle_ms: u64,
    /// Monitor poll while values are known
    pub monitor_active_ms: u64,
    /// Wait for a started handler to report running
    pub start_timeout_ms: u64,
    /// Settle time after a roll press
    pub roll_settle_ms: u64,
    /// Retry interval when a control is not on screen
    pub retry_ms: u64,
    /// Bound on waiting for a roll animation to finish
    pub rolling_end_ms: u64,
    /// Wait after a build click before checking for a popup
    pub build_click_ms: u64,
    /// Pause between build passes
    pub build_pass_ms: u64,
    /// Retry interval while opening the build menu
    pub build_menu_ms: u64,
    /// Delay between multiplier clicks
    pub multiplier_click_ms: u64,
    /// Interval of the opportunistic handlers
    pub handler_ms: u64,
    /// Cooldown after an opportunistic handler clicks
    pub handler_cooldown_ms: u64,
    /// Delay between pointer move and press
    pub pointer_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            sample_ms: 500,
            debounce_ms: 10_000,
            monitor_idle_ms: 2000,
            monitor_active_ms: 500,
            start_timeout_ms: 5000,
            roll_settle_ms: 2000,
            retry_ms: 1000,
            rolling_end_ms: 5000,
            build_click_ms: 1500,
            build_pass_ms: 1000,
            build_menu_ms: 2000,
            multiplier_click_ms: 500,
            handler_ms: 1000,
            handler_cooldown_ms: 2000,
            pointer_settle_ms: 200,
        }
    }
}

impl Timings {
    /// Millisecond-scale timings for tests
    pub fn fast() -> Self {
        Self {
            sample_ms: 5,
            debounce_ms: 10,
            monitor_idle_ms: 5,
            monitor_active_ms: 2,
            start_timeout_ms: 500,
            roll_settle_ms: 2,
            retry_ms: 2,
            rolling_end_ms: 5,
            build_click_ms: 2,
            build_pass_ms: 2,
            build_menu_ms: 2,
            multiplier_click_ms: 2,
            handler_ms: 2,
            handler_cooldown_ms: 2,
            pointer_settle_ms: 0,
        }
    }

    /// Milliseconds as a [`Duration`]
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    /// Pause between HUD sampling passes
    pub fn sample(&self) -> Duration {
        Self::ms(self.sample_ms)
    }

    /// Settle time after another component releases the board
    pub fn debounce(&self) -> Duration {
        Self::ms(self.debounce_ms)
    }

    /// Monitor poll interval when nothing is about to happen
    pub fn monitor_idle(&self) -> Duration {
        Self::ms(self.monitor_idle_ms)
    }

    /// Monitor poll interval while the dice are nearly out
    pub fn monitor_active(&self) -> Duration {
        Self::ms(self.monitor_active_ms)
    }

    /// How long to wait for a spawned handler to report running
    pub fn start_timeout(&self) -> Duration {
        Self::ms(self.start_timeout_ms)
    }

    pub fn retry(&self) -> Duration {
        Self::ms(self.retry_ms)
    }

    pub fn handler(&self) -> Duration {
        Self::ms(self.handler_ms)
    }

    /// Pause after an opportunistic handler clicked something
    pub fn handler_cooldown(&self) -> Duration {
        Self::ms(self.handler_cooldown_ms)
    }
}
