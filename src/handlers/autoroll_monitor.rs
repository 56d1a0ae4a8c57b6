//! Autoroll monitor
//!
//! Keeps the autoroller running while there are dice and swaps it for the
//! disable counterpart once they run out. It never touches either handler
//! while a build or a multiplier fix is active or pending.

use std::sync::Arc;

use super::{AutorollController, Context, RunFlag};
use crate::state::BotStatus;

/// What the monitor wants the roll handlers to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutorollDecision {
    /// Dice are out: stop rolling and keep the game from autorolling
    Disable,
    /// Dice available, or unknown and assumed available
    Roll,
}

/// Unknown rolls are treated as available; the autoroller's popup streak
/// corrects the guess if it was wrong
pub fn decide(rolls: Option<u32>, stop_below: u32) -> AutorollDecision {
    match rolls {
        Some(rolls) if rolls < stop_below => AutorollDecision::Disable,
        _ => AutorollDecision::Roll,
    }
}

pub struct AutorollMonitor {
    ctx: Context,
    controller: Arc<AutorollController>,
}

impl AutorollMonitor {
    pub fn new(ctx: Context, controller: Arc<AutorollController>) -> Self {
        Self { ctx, controller }
    }

    /// Re-evaluate on every dice change until `running` is cleared
    pub fn run(&self, running: &RunFlag) {
        log::info!("Autoroll monitor started");
        let poll = self.ctx.timings().monitor_idle();
        while running.is_set() {
            if self.wait_for_exclusive(running) {
                continue;
            }
            let dice = self.ctx.state.dice.get();
            self.apply(decide(dice.rolls, self.ctx.settings.autoroll.stop_below()));
            self.ctx.state.dice.wait_for_change(&dice, poll);
        }
        log::info!("Autoroll monitor stopped");
    }

    fn exclusive_busy(&self) -> bool {
        let state = &self.ctx.state;
        state.builder_running.is_set()
            || state.multiplier_handler_running.is_set()
            || state.mode.is_contended()
    }

    /// Block while a build or multiplier fix runs, then debounce; returns
    /// true if there was anything to wait for
    fn wait_for_exclusive(&self, running: &RunFlag) -> bool {
        if !self.exclusive_busy() {
            return false;
        }
        log::debug!(
            "Autoroll monitor waiting for {}",
            self.ctx.state.mode.active()
        );
        let poll = self.ctx.timings().monitor_idle();
        while running.is_set() && self.exclusive_busy() {
            self.ctx.state.mode.wait_uncontended(poll);
        }
        running.sleep_while_set(self.ctx.timings().debounce());
        true
    }

    /// Act on one decision
    pub fn apply(&self, decision: AutorollDecision) {
        let state = &self.ctx.state;
        let start_timeout = self.ctx.timings().start_timeout();
        match decision {
            AutorollDecision::Disable => {
                if self.controller.is_autorolling() {
                    log::info!("Out of dice, stopping autoroll");
                    self.controller.stop_autoroll();
                }
                if !self.controller.is_disabling() && self.controller.start_disable() {
                    state
                        .disable_autoroll_running
                        .wait_until_timeout(|running| *running, start_timeout);
                }
                if state.status() == BotStatus::Autorolling {
                    state.set_status(BotStatus::WaitingForDice(None));
                }
            }
            AutorollDecision::Roll => {
                // A build or multiplier fix may have reserved the board since
                // the last check; its disable handler must keep running
                if state.mode.is_contended() {
                    log::debug!("Board reserved for {}, not rolling", state.mode.active());
                    return;
                }
                if self.controller.is_disabling() {
                    self.controller.stop_disable();
                }
                if !self.controller.is_autorolling() {
                    if self.controller.start_autoroll() {
                        state
                            .autoroll_running
                            .wait_until_timeout(|running| *running, start_timeout);
                    } else {
                        log::debug!("Autoroll start refused, retrying next cycle");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::TaskHandle;
    use crate::state::Mode;
    use crate::testing::Harness;
    use std::time::Duration;

    fn monitor(h: &Harness) -> (AutorollMonitor, Arc<AutorollController>) {
        let controller = Arc::new(AutorollController::new(h.ctx.clone()));
        (
            AutorollMonitor::new(h.ctx.clone(), Arc::clone(&controller)),
            controller,
        )
    }

    fn spawn(monitor: AutorollMonitor) -> TaskHandle {
        TaskHandle::spawn("autoroll-monitor", move |running| monitor.run(&running)).unwrap()
    }

    #[test]
    fn test_decide() {
        assert_eq!(decide(None, 1), AutorollDecision::Roll);
        assert_eq!(decide(Some(0), 1), AutorollDecision::Disable);
        assert_eq!(decide(Some(1), 1), AutorollDecision::Roll);
        assert_eq!(decide(Some(4), 5), AutorollDecision::Disable);
    }

    #[test]
    fn test_out_of_dice_swaps_to_disable() {
        let h = Harness::new();
        let (monitor, controller) = monitor(&h);

        monitor.apply(AutorollDecision::Roll);
        assert!(controller.is_autorolling());

        monitor.apply(AutorollDecision::Disable);
        assert!(!controller.is_autorolling());
        assert!(controller.is_disabling());
        assert_eq!(h.state().status(), BotStatus::WaitingForDice(None));

        monitor.apply(AutorollDecision::Roll);
        assert!(!controller.is_disabling());
        assert!(controller.is_autorolling());
        controller.stop_all();
    }

    #[test]
    fn test_no_autoroll_while_building() {
        let h = Harness::new();
        let (monitor, controller) = monitor(&h);
        h.state().builder_running.set(true);
        let grant = h.state().mode.reserve(Mode::Building).wait();

        let task = spawn(monitor);
        std::thread::sleep(Duration::from_millis(40));
        assert!(!controller.is_autorolling());

        h.state().builder_running.set(false);
        drop(grant);
        let started = h
            .state()
            .autoroll_running
            .wait_until_timeout(|running| *running, Duration::from_secs(2));
        assert_eq!(started, Some(true));

        task.stop();
        controller.stop_all();
    }

    #[test]
    fn test_no_autoroll_while_fixing_multiplier() {
        let h = Harness::new();
        let (monitor, controller) = monitor(&h);
        h.state().multiplier_handler_running.set(true);
        let grant = h.state().mode.reserve(Mode::FixingMultiplier).wait();

        let task = spawn(monitor);
        std::thread::sleep(Duration::from_millis(40));
        assert!(!controller.is_autorolling());
        assert!(!h.state().autoroll_running.is_set());

        h.state().multiplier_handler_running.set(false);
        drop(grant);
        let started = h
            .state()
            .autoroll_running
            .wait_until_timeout(|running| *running, Duration::from_secs(2));
        assert_eq!(started, Some(true));

        task.stop();
        controller.stop_all();
    }

    #[test]
    fn test_roll_keeps_disable_while_board_reserved() {
        let h = Harness::new();
        let (monitor, controller) = monitor(&h);
        assert!(controller.start_disable());
        let reservation = h.state().mode.reserve(Mode::Building);

        monitor.apply(AutorollDecision::Roll);
        assert!(controller.is_disabling());
        assert!(!controller.is_autorolling());

        drop(reservation);
        monitor.apply(AutorollDecision::Roll);
        assert!(!controller.is_disabling());
        assert!(controller.is_autorolling());
        controller.stop_all();
    }

    #[test]
    fn test_rolls_change_reevaluates() {
        let h = Harness::new();
        let (monitor, controller) = monitor(&h);
        h.state().set_rolls(10, 50);

        let task = spawn(monitor);
        assert!(h
            .state()
            .autoroll_running
            .wait_until_timeout(|running| *running, Duration::from_secs(2))
            .is_some());

        h.state().set_rolls(0, 50);
        assert!(h
            .state()
            .disable_autoroll_running
            .wait_until_timeout(|running| *running, Duration::from_secs(2))
            .is_some());

        task.stop();
        assert!(!controller.is_autorolling());
        controller.stop_all();
    }
}
