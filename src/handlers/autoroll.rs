//! Autoroll handler
//!
//! Holds the GO control to keep the dice rolling, and infers that the dice
//! ran out from a streak of popups, since the roll counter is not always
//! readable. The disable counterpart clicks the "stop autoroll" control
//! whenever the game is still rolling on its own.
//!
//! [`AutorollController`] is the only way to start or stop either handler.
//! Starting the autoroller needs a [`Mode::Rolling`] grant, so nothing can
//! start it while a build or multiplier fix is active or reserved.

use parking_lot::Mutex;
use std::thread::JoinHandle;

use super::{join_logged, spawn_named, Context};
use crate::config::Timings;
use crate::state::{BotStatus, Mode, PopupSubscription};
use crate::vision::Template;

/// Why the autoroller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutorollExit {
    /// The running flag was cleared
    Stopped,
    /// Too many consecutive popups; rolls were forced to zero
    DiceExhausted,
}

/// One activation of the rolling loop
pub struct AutorollHandler {
    ctx: Context,
    popups: PopupSubscription,
    streak: u32,
}

impl AutorollHandler {
    pub fn new(ctx: Context) -> Self {
        let popups = ctx.state.popup.subscribe();
        Self {
            ctx,
            popups,
            streak: 0,
        }
    }

    /// Roll until stopped or the popup streak trips
    pub fn run(mut self) -> AutorollExit {
        log::info!("Autoroll loop started");
        loop {
            if let Some(exit) = self.step() {
                log::info!("Autoroll loop exited: {:?}", exit);
                return exit;
            }
        }
    }

    /// Consecutive popups seen without a clean roll in between
    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// One iteration: check popups, press GO if visible, check popups again
    pub fn step(&mut self) -> Option<AutorollExit> {
        let state = &self.ctx.state;
        let settings = &self.ctx.settings;
        let threshold = settings.autoroll.popup_streak.max(1);

        if !state.autoroll_running.is_set() {
            return Some(AutorollExit::Stopped);
        }
        if self.popups.take() {
            self.streak += 1;
            log::debug!("Popup before roll ({}/{})", self.streak, threshold);
        }
        if self.streak >= threshold {
            return Some(self.dice_exhausted());
        }

        let pressed = match self.ctx.perception.locate(&Template::Go) {
            Some(go) => {
                let hold = Timings::ms(settings.autoroll.hold_ms);
                match self.ctx.input.long_press(go, hold) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("Roll press skipped: {}", e);
                        false
                    }
                }
            }
            None => {
                log::debug!("GO not visible");
                false
            }
        };

        let pause = if pressed {
            settings.timings.roll_settle_ms
        } else {
            settings.timings.retry_ms
        };
        state.autoroll_running.sleep_while_set(Timings::ms(pause));

        if self.popups.take() {
            self.streak += 1;
            log::debug!("Popup after roll ({}/{})", self.streak, threshold);
        } else if pressed {
            self.streak = 0;
        }
        if self.streak >= threshold {
            return Some(self.dice_exhausted());
        }

        if pressed {
            let rolling_end = Timings::ms(settings.timings.rolling_end_ms);
            if state
                .is_rolling
                .wait_until_timeout(|rolling| !*rolling, rolling_end)
                .is_none()
            {
                log::debug!("Roll animation still running after {:?}", rolling_end);
            }
        }
        None
    }

    fn dice_exhausted(&self) -> AutorollExit {
        log::info!(
            "{} consecutive popups, assuming dice are exhausted",
            self.streak
        );
        self.ctx.state.mark_dice_exhausted();
        AutorollExit::DiceExhausted
    }
}

/// Click "stop autoroll" whenever it shows until the flag is cleared
fn run_disable(ctx: &Context) {
    log::info!("Disable-autoroll loop started");
    let state = &ctx.state;
    while state.disable_autoroll_running.is_set() {
        if let Some(stop) = ctx.perception.locate(&Template::StopAutoroll) {
            log::debug!("Game still autorolling, stopping it");
            ctx.input.try_click(stop, "stop autoroll");
        }
        state
            .disable_autoroll_running
            .sleep_while_set(ctx.timings().retry());
    }
    log::info!("Disable-autoroll loop exited");
}

/// Starts and stops the autoroller and its disable counterpart
pub struct AutorollController {
    ctx: Context,
    autoroll: Mutex<Option<JoinHandle<AutorollExit>>>,
    disable: Mutex<Option<JoinHandle<()>>>,
}

impl AutorollController {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            autoroll: Mutex::new(None),
            disable: Mutex::new(None),
        }
    }

    /// True while an autoroller thread owns the rolling grant
    pub fn is_autorolling(&self) -> bool {
        self.ctx.state.autoroll_running.is_set()
    }

    /// True while the disable-autoroll handler runs
    pub fn is_disabling(&self) -> bool {
        self.ctx.state.disable_autoroll_running.is_set()
    }

    /// Start a fresh autoroller
    ///
    /// Returns false when rolling is refused because another mode holds or
    /// has reserved the board. Already running counts as started.
    pub fn start_autoroll(&self) -> bool {
        let state = &self.ctx.state;
        let mut slot = self.autoroll.lock();
        if state.autoroll_running.is_set() {
            return true;
        }
        if let Some(previous) = slot.take() {
            join_logged("autoroll", previous);
        }

        let Some(grant) = state.mode.try_request(Mode::Rolling) else {
            log::debug!(
                "Autoroll refused while {} is active or pending",
                state.mode.active()
            );
            return false;
        };

        state.autoroll_running.set(true);
        let handler = AutorollHandler::new(self.ctx.clone());
        let shared = std::sync::Arc::clone(state);
        let spawned = spawn_named("autoroll", move || {
            let exit = handler.run();
            shared.autoroll_running.set(false);
            drop(grant);
            exit
        });
        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                state.set_status(BotStatus::Autorolling);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn autoroller: {}", e);
                state.autoroll_running.set(false);
                false
            }
        }
    }

    /// Clear the autoroll flag and wait for the handler to exit; the
    /// rolling grant is released before this returns
    pub fn stop_autoroll(&self) -> Option<AutorollExit> {
        let mut slot = self.autoroll.lock();
        self.ctx.state.autoroll_running.set(false);
        let exit = slot.take().and_then(|handle| join_logged("autoroll", handle));
        if exit.is_some() {
            log::info!("Autoroll stopped");
        }
        exit
    }

    /// Start the disable counterpart; already running counts as started
    pub fn start_disable(&self) -> bool {
        let state = &self.ctx.state;
        let mut slot = self.disable.lock();
        if state.disable_autoroll_running.is_set() {
            return true;
        }
        if let Some(previous) = slot.take() {
            join_logged("disable-autoroll", previous);
        }

        state.disable_autoroll_running.set(true);
        let ctx = self.ctx.clone();
        match spawn_named("disable-autoroll", move || run_disable(&ctx)) {
            Ok(handle) => {
                *slot = Some(handle);
                true
            }
            Err(e) => {
                log::error!("Failed to spawn disable-autoroll: {}", e);
                state.disable_autoroll_running.set(false);
                false
            }
        }
    }

    /// Stop the disable-autoroll handler and join its thread
    pub fn stop_disable(&self) {
        let mut slot = self.disable.lock();
        self.ctx.state.disable_autoroll_running.set(false);
        if let Some(handle) = slot.take() {
            join_logged("disable-autoroll", handle);
            log::debug!("Disable-autoroll stopped");
        }
    }

    /// Flip the autoroller on or off; returns whether it is now running
    pub fn toggle_autoroll(&self) -> bool {
        if self.is_autorolling() {
            self.stop_autoroll();
            false
        } else {
            self.start_autoroll()
        }
    }

    /// Stop both roll handlers
    pub fn stop_all(&self) {
        self.stop_autoroll();
        self.stop_disable();
    }
}
