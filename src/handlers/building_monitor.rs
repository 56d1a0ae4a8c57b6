//! Building monitor
//!
//! Starts a build cycle once the dice are gone and there is money to spend.
//! The cycle reserves [`Mode::Building`] before stopping the autoroller, so
//! the autoroll monitor cannot start a new roll while the builder takes over,
//! and `builder_running` is only raised once the rolling grant is gone.

use std::sync::Arc;
use std::time::Instant;

use super::{
    join_logged, spawn_named, AutorollController, BuildReport, BuildingHandler, Context, RunFlag,
};
use crate::config::{Settings, Timings};
use crate::game::{layout, parse_refill_minutes};
use crate::state::{BotStatus, Mode};
use crate::vision::Preprocess;

/// Dice exhausted and enough money for at least a cheap upgrade
pub fn should_build(rolls: Option<u32>, money: Option<u64>, settings: &Settings) -> bool {
    let out_of_dice = matches!(rolls, Some(rolls) if rolls < settings.autoroll.stop_below());
    let funded = money.is_some_and(|money| money >= settings.building.minimum_money);
    out_of_dice && funded
}

pub struct BuildingMonitor {
    ctx: Context,
    controller: Arc<AutorollController>,
}

impl BuildingMonitor {
    pub fn new(ctx: Context, controller: Arc<AutorollController>) -> Self {
        Self { ctx, controller }
    }

    /// Watch dice and money, running a build cycle whenever both allow it
    pub fn run(&self, running: &RunFlag) {
        log::info!("Building monitor started");
        let state = &self.ctx.state;
        let timings = self.ctx.timings().clone();
        let stop_below = self.ctx.settings.autoroll.stop_below();

        while running.is_set() {
            if self.wait_for_multiplier(running) {
                continue;
            }

            let rolls = state.rolls();
            let money = state.money.get();
            if should_build(rolls, money, &self.ctx.settings) && !state.builder_running.is_set() {
                log::info!("Out of dice with {:?} money, starting build cycle", money);
                self.run_cycle(running);
                self.wait_for_replenishment(running);
                continue;
            }

            let poll = match rolls {
                Some(rolls) if rolls < stop_below => timings.monitor_active(),
                _ => timings.monitor_idle(),
            };
            state.dice.wait_notified(poll);
        }
        log::info!("Building monitor stopped");
    }

    fn wait_for_multiplier(&self, running: &RunFlag) -> bool {
        let state = &self.ctx.state;
        let busy = || {
            state.multiplier_handler_running.is_set()
                || state.mode.is_claimed(Mode::FixingMultiplier)
        };
        if !busy() {
            return false;
        }
        log::debug!("Building monitor waiting for multiplier fix");
        let poll = self.ctx.timings().monitor_idle();
        while running.is_set() && busy() {
            state.mode.wait_uncontended(poll);
        }
        running.sleep_while_set(self.ctx.timings().debounce());
        true
    }

    /// Suspend rolling, run one fresh building handler, then hand the board
    /// back
    pub fn run_cycle(&self, running: &RunFlag) -> Option<BuildReport> {
        let state = &self.ctx.state;
        let poll = self.ctx.timings().monitor_idle();

        let reservation = state.mode.reserve(Mode::Building);
        state.set_status(BotStatus::WaitingFor(Mode::Building));
        self.controller.stop_autoroll();
        self.controller.start_disable();
        let grant = reservation.wait();

        state.builder_finished.set(false);
        state.builder_running.set(true);
        state.set_status(BotStatus::Building);

        while running.is_set() && !state.wait_home_screen(poll) {
            log::debug!("Build cycle waiting for home screen");
        }

        let report = if running.is_set() {
            let handler = BuildingHandler::new(self.ctx.clone());
            match spawn_named("building", move || handler.run()) {
                Ok(thread) => {
                    while state
                        .builder_finished
                        .wait_until_timeout(|finished| *finished, poll)
                        .is_none()
                    {
                        if thread.is_finished() {
                            break;
                        }
                        if !running.is_set() {
                            state.builder_running.set(false);
                        }
                    }
                    join_logged("building", thread)
                }
                Err(e) => {
                    log::error!("Failed to spawn building handler: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.controller.stop_disable();
        state.builder_running.set(false);
        drop(grant);
        state.set_status(BotStatus::Running);
        report
    }

    /// Wait, bounded, for the dice to come back before considering another
    /// cycle
    fn wait_for_replenishment(&self, running: &RunFlag) {
        let state = &self.ctx.state;
        let building = &self.ctx.settings.building;
        let deadline = Instant::now() + Timings::ms(building.replenish_wait_ms);
        let resume_at = self.ctx.settings.autoroll.resume_at();
        let poll = self.ctx.timings().monitor_idle();

        while running.is_set() && Instant::now() < deadline {
            let dice = state.dice.get();
            let needed = resume_at.min(dice.capacity);
            match dice.rolls {
                Some(rolls) if rolls < needed => {}
                _ => break,
            }

            let countdown = self.ctx.read(
                layout::REFILL_COUNTDOWN,
                &layout::REFILL_OCR,
                &Preprocess::gray(),
            );
            let minutes = parse_refill_minutes(&countdown);
            state.set_status(BotStatus::WaitingForDice(minutes));
            state.dice.wait_for_change(&dice, poll);
        }
        state.set_status(BotStatus::Running);
    }
}
