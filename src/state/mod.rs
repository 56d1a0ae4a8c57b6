//! Shared game state
//!
//! Process-wide state shared by every sampler, monitor, and handler. Each
//! attribute is its own [`Watched`] cell, so readers of unrelated attributes
//! never contend and any party can block until a specific attribute changes.

pub mod debug;
pub mod mode;
pub mod popup;
pub mod watch;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use debug::{Overlay, OverlayShape, Overlays, RecentLogs};
pub use mode::{Mode, ModeArbiter, ModeGrant, Reservation};
pub use popup::{PopupSignal, PopupSubscription};
pub use watch::Watched;

/// Roll capacity assumed until the first successful read
pub const DEFAULT_ROLL_CAPACITY: u32 = 50;

/// Dice counter from one HUD read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiceCount {
    /// `None` until the first good read
    pub rolls: Option<u32>,
    pub capacity: u32,
}

impl Default for DiceCount {
    fn default() -> Self {
        Self {
            rolls: None,
            capacity: DEFAULT_ROLL_CAPACITY,
        }
    }
}

/// Human-readable phase shown on the debug overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BotStatus {
    Running,
    Paused,
    Autorolling,
    Building,
    FixingMultiplier,
    /// Dice exhausted; minutes until refill when the countdown was legible
    WaitingForDice(Option<u32>),
    /// Blocked on another component finishing
    WaitingFor(Mode),
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStatus::Running => f.write_str("RUNNING"),
            BotStatus::Paused => f.write_str("PAUSED"),
            BotStatus::Autorolling => f.write_str("AUTOROLLING"),
            BotStatus::Building => f.write_str("BUILDING"),
            BotStatus::FixingMultiplier => f.write_str("FIXING MULTIPLIER"),
            BotStatus::WaitingForDice(Some(minutes)) => {
                write!(f, "PAUSED - WAITING {} MIN FOR DICE", minutes)
            }
            BotStatus::WaitingForDice(None) => f.write_str("WAITING FOR DICE"),
            BotStatus::WaitingFor(mode) => {
                write!(f, "WAITING FOR {}", mode.to_string().to_uppercase())
            }
        }
    }
}

/// Process-wide mutable game state
#[derive(Debug)]
pub struct GameState {
    /// Last read currency amount; `None` until the first good read
    pub money: Watched<Option<u64>>,
    /// Rolls remaining and capacity, always written together
    pub dice: Watched<DiceCount>,
    pub multiplier: Watched<u32>,
    /// True while a roll animation is in progress
    pub is_rolling: Watched<bool>,
    /// Latched true once the home view is confirmed; gates all sampling
    pub in_home_screen: Watched<bool>,
    pub popup: Arc<PopupSignal>,

    pub autoroll_running: Watched<bool>,
    pub disable_autoroll_running: Watched<bool>,
    pub builder_running: Watched<bool>,
    pub builder_finished: Watched<bool>,
    pub multiplier_handler_running: Watched<bool>,
    /// Bulk pause for the opportunistic handlers
    pub idle: Watched<bool>,

    pub status: Watched<BotStatus>,
    pub mode: Arc<ModeArbiter>,

    pub overlays: Arc<Overlays>,
    pub recent_logs: Arc<RecentLogs>,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_recent_logs(Arc::new(RecentLogs::default()))
    }

    /// Create state sharing an existing log ring buffer with the logger
    pub fn with_recent_logs(recent_logs: Arc<RecentLogs>) -> Self {
        Self {
            money: Watched::new(None),
            dice: Watched::new(DiceCount::default()),
            multiplier: Watched::new(1),
            is_rolling: Watched::new(false),
            in_home_screen: Watched::new(false),
            popup: Arc::new(PopupSignal::new()),
            autoroll_running: Watched::new(false),
            disable_autoroll_running: Watched::new(false),
            builder_running: Watched::new(false),
            builder_finished: Watched::new(false),
            multiplier_handler_running: Watched::new(false),
            idle: Watched::new(false),
            status: Watched::new(BotStatus::Running),
            mode: ModeArbiter::new(),
            overlays: Arc::new(Overlays::default()),
            recent_logs,
        }
    }

    /// Dice rolls remaining; `None` until the first good read
    pub fn rolls(&self) -> Option<u32> {
        self.dice.get().rolls
    }

    /// Store a freshly read roll count
    ///
    /// Rejects readings above the capacity; returns whether the value was
    /// accepted.
    pub fn set_rolls(&self, rolls: u32, capacity: u32) -> bool {
        if rolls > capacity {
            return false;
        }
        self.dice.set(DiceCount {
            rolls: Some(rolls),
            capacity,
        });
        true
    }

    /// Force the roll count to zero after inferring the dice ran out
    pub fn mark_dice_exhausted(&self) {
        self.dice.update(|dice| dice.rolls = Some(0));
    }

    /// Operator confirmation that the home view is showing
    pub fn confirm_home_screen(&self) {
        self.in_home_screen.set(true);
    }

    /// Block until the home screen is confirmed, bounded by `timeout`
    pub fn wait_home_screen(&self, timeout: Duration) -> bool {
        self.in_home_screen
            .wait_until_timeout(|home| *home, timeout)
            .is_some()
    }

    /// Update the status, logging actual changes
    pub fn set_status(&self, status: BotStatus) {
        if self.status.get() != status {
            log::info!("Status: {}", status);
        }
        self.status.set(status);
    }

    pub fn status(&self) -> BotStatus {
        self.status.get()
    }

    /// Autoroll and the builder never run at the same time
    pub fn roles_exclusive(&self) -> bool {
        !(self.builder_running.is_set() && self.autoroll_running.is_set())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_unknown() {
        let state = GameState::new();
        assert_eq!(state.money.get(), None);
        assert_eq!(state.rolls(), None);
        assert_eq!(state.multiplier.get(), 1);
        assert!(!state.in_home_screen.is_set());
        assert_eq!(state.mode.active(), Mode::Idle);
    }

    #[test]
    fn test_rolls_above_capacity_rejected() {
        let state = GameState::new();
        assert!(state.set_rolls(12, 50));
        assert_eq!(state.rolls(), Some(12));

        assert!(!state.set_rolls(60, 50));
        assert_eq!(state.rolls(), Some(12));
    }

    #[test]
    fn test_readers_never_see_rolls_above_capacity() {
        let state = Arc::new(GameState::new());
        let done = Arc::new(Watched::new(false));

        let writer = std::thread::spawn({
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            move || {
                for _ in 0..20_000 {
                    state.set_rolls(5, 10);
                    state.set_rolls(40, 50);
                }
                done.set(true);
            }
        });

        let mut torn = 0;
        while !done.is_set() {
            let dice = state.dice.get();
            if dice.rolls.is_some_and(|rolls| rolls > dice.capacity) {
                torn += 1;
            }
        }
        writer.join().unwrap();
        assert_eq!(torn, 0);
    }

    #[test]
    fn test_dice_exhausted_notifies() {
        let state = GameState::new();
        state.set_rolls(5, 50);
        let before = state.dice.notify_count();

        state.mark_dice_exhausted();
        assert_eq!(state.rolls(), Some(0));
        assert_eq!(state.dice.notify_count(), before + 1);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BotStatus::Autorolling.to_string(), "AUTOROLLING");
        assert_eq!(
            BotStatus::WaitingForDice(Some(12)).to_string(),
            "PAUSED - WAITING 12 MIN FOR DICE"
        );
        assert_eq!(
            BotStatus::WaitingForDice(None).to_string(),
            "WAITING FOR DICE"
        );
        assert_eq!(
            BotStatus::WaitingFor(Mode::Building).to_string(),
            "WAITING FOR BUILDING"
        );
    }
}
