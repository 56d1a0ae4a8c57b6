//! Multiplier handler and monitor
//!
//! The handler clicks the multiplier control until the game shows "MAX" or
//! its timeout runs out. The monitor starts a fresh handler whenever the
//! sampled multiplier drops below the configured target, holding
//! [`Mode::FixingMultiplier`] for the duration so neither rolling nor
//! building can act meanwhile.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use super::{join_logged, spawn_named, AutorollController, Context, RunFlag};
use crate::config::Timings;
use crate::game::layout;
use crate::state::{BotStatus, Mode};
use crate::vision::Preprocess;

/// How a multiplier fix ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierExit {
    /// The control reads "MAX"
    Max,
    TimedOut,
    /// The home screen was never confirmed
    NotHome,
}

pub struct MultiplierHandler {
    ctx: Context,
}

impl MultiplierHandler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    fn shows_max(&self) -> bool {
        self.ctx
            .read(
                layout::MULTIPLIER_MAX,
                &layout::MULTIPLIER_MAX_OCR,
                &Preprocess::gray(),
            )
            .to_uppercase()
            .contains("MAX")
    }

    /// Click the multiplier up until it reaches the target or times out
    pub fn run(self) -> MultiplierExit {
        let state = &self.ctx.state;
        let timeout = Timings::ms(self.ctx.settings.multiplier.timeout_ms);
        let deadline = Instant::now() + timeout;

        if !state.wait_home_screen(timeout) {
            log::warn!("Home screen not confirmed, multiplier left alone");
            return MultiplierExit::NotHome;
        }
        state.multiplier_handler_running.set(true);
        log::info!("Raising multiplier");

        let button = self.ctx.center_of(layout::MULTIPLIER_BUTTON);
        let pause = Timings::ms(self.ctx.timings().multiplier_click_ms);
        let exit = loop {
            if self.shows_max() {
                break MultiplierExit::Max;
            }
            if Instant::now() >= deadline {
                log::warn!("Multiplier not at MAX after {:?}", timeout);
                break MultiplierExit::TimedOut;
            }
            self.ctx.input.try_click(button, "multiplier");
            thread::sleep(pause);
        };

        if let Err(e) = self.ctx.input.park() {
            log::warn!("Failed to park pointer: {}", e);
        }
        state.multiplier_handler_running.set(false);
        log::info!("Multiplier fix finished: {:?}", exit);
        exit
    }
}

pub struct MultiplierMonitor {
    ctx: Context,
    controller: Arc<AutorollController>,
}

impl MultiplierMonitor {
    pub fn new(ctx: Context, controller: Arc<AutorollController>) -> Self {
        Self { ctx, controller }
    }

    /// Watch the multiplier and fix it whenever it drops below target
    pub fn run(&self, running: &RunFlag) {
        log::info!("Multiplier monitor started");
        let state = &self.ctx.state;
        let poll = self.ctx.timings().monitor_idle();
        let target = self.ctx.settings.multiplier.target;
        // Multiplier value at which the control last read MAX
        let mut maxed_at: Option<u32> = None;

        while running.is_set() {
            if !state.wait_home_screen(poll) {
                continue;
            }
            let current = state.multiplier.get();
            if maxed_at.is_some_and(|maxed| maxed != current) {
                maxed_at = None;
            }

            let idle =
                !state.multiplier_handler_running.is_set() && !state.builder_running.is_set();
            if current < target && maxed_at.is_none() && idle {
                log::info!("Multiplier x{} below target x{}", current, target);
                if self.fix() == Some(MultiplierExit::Max) {
                    maxed_at = Some(state.multiplier.get());
                }
                running.sleep_while_set(self.ctx.timings().debounce());
                continue;
            }
            state.multiplier.wait_notified(poll);
        }
        log::info!("Multiplier monitor stopped");
    }

    /// Take the board from the autoroller and run one fresh handler
    pub fn fix(&self) -> Option<MultiplierExit> {
        let state = &self.ctx.state;
        let reservation = state.mode.reserve(Mode::FixingMultiplier);
        self.controller.stop_autoroll();
        let Some(grant) = reservation.wait_timeout(self.ctx.timings().start_timeout()) else {
            log::debug!(
                "Board busy with {}, multiplier fix postponed",
                state.mode.active()
            );
            return None;
        };

        state.set_status(BotStatus::FixingMultiplier);
        let handler = MultiplierHandler::new(self.ctx.clone());
        let exit = match spawn_named("multiplier", move || handler.run()) {
            Ok(thread) => join_logged("multiplier", thread),
            Err(e) => {
                log::error!("Failed to spawn multiplier handler: {}", e);
                None
            }
        };
        drop(grant);
        state.set_status(BotStatus::Running);
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::TaskHandle;
    use crate::testing::Harness;
    use std::time::Duration;

    #[test]
    fn test_clicks_until_max() {
        let h = Harness::new();
        h.state().confirm_home_screen();
        h.perception.queue_texts(layout::MULTIPLIER_MAX, &["x5", "x10"]);
        h.perception.set_text(layout::MULTIPLIER_MAX, "MAX");

        let exit = MultiplierHandler::new(h.ctx.clone()).run();

        assert_eq!(exit, MultiplierExit::Max);
        let button = h.ctx.center_of(layout::MULTIPLIER_BUTTON);
        assert_eq!(h.input.click_points(), vec![button, button]);
        assert_eq!(h.input.last_move(), Some(h.ctx.input.park_point()));
        assert!(!h.state().multiplier_handler_running.is_set());
    }

    #[test]
    fn test_times_out_without_max() {
        let h = Harness::new();
        h.state().confirm_home_screen();

        let exit = MultiplierHandler::new(h.ctx.clone()).run();

        assert_eq!(exit, MultiplierExit::TimedOut);
        assert!(h.input.clicks() > 0);
        assert!(!h.state().multiplier_handler_running.is_set());
    }

    #[test]
    fn test_needs_home_screen() {
        let h = Harness::new();
        let exit = MultiplierHandler::new(h.ctx.clone()).run();
        assert_eq!(exit, MultiplierExit::NotHome);
        assert_eq!(h.input.clicks(), 0);
        assert_eq!(h.state().multiplier_handler_running.notify_count(), 0);
    }

    #[test]
    fn test_monitor_fixes_low_multiplier() {
        let h = Harness::new();
        h.state().confirm_home_screen();
        h.perception.set_text(layout::MULTIPLIER_MAX, "MAX");
        let controller = Arc::new(AutorollController::new(h.ctx.clone()));
        assert!(controller.start_autoroll());

        let monitor = MultiplierMonitor::new(h.ctx.clone(), Arc::clone(&controller));
        let task =
            TaskHandle::spawn("multiplier-monitor", move |running| monitor.run(&running)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while h.state().multiplier_handler_running.notify_count() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(h.state().multiplier_handler_running.notify_count(), 2);
        assert!(!controller.is_autorolling());

        task.stop();
        assert_eq!(h.state().mode.active(), Mode::Idle);
        controller.stop_all();
    }
}
