//! Building handler
//!
//! One activation opens the build menu and buys upgrades slot by slot
//! while money allows, then records the costs it saw and leaves the menu.
//! A fresh handler is built for every cycle.
//!
//! The handler stops after a pass in which nothing was clicked, or after
//! several clicks in a row each raised a popup, which is how the game
//! reports that an upgrade could not be paid for.

use super::Context;
use crate::config::Timings;
use crate::game::board::{LEVEL_COUNT, SLOT_COUNT};
use crate::game::{board_name, layout, parse_cost, BoardStore, CostTable};
use crate::state::PopupSubscription;
use crate::vision::Template;

/// Why a build cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildExit {
    /// Consecutive popups after clicks; assumed out of money
    PopupStreak,
    /// A full pass with nothing affordable
    NothingAffordable,
    /// The builder flag was cleared from outside
    Stopped,
}

/// Outcome of one build cycle
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub exit: BuildExit,
    pub passes: u32,
    pub clicks: u32,
    pub board: Option<String>,
}

pub struct BuildingHandler {
    ctx: Context,
    popups: PopupSubscription,
    costs: CostTable,
    levels: [usize; SLOT_COUNT],
    streak: u32,
    clicks: u32,
}

impl BuildingHandler {
    pub fn new(ctx: Context) -> Self {
        let popups = ctx.state.popup.subscribe();
        Self {
            ctx,
            popups,
            costs: CostTable::new(),
            levels: [0; SLOT_COUNT],
            streak: 0,
            clicks: 0,
        }
    }

    /// Run upgrade passes until the board is done or the cycle must end
    pub fn run(mut self) -> BuildReport {
        log::info!("Build cycle started");
        let mut passes = 0;
        let mut board = None;

        let exit = if self.enter_menu() {
            loop {
                if !self.ctx.state.builder_running.is_set() {
                    break BuildExit::Stopped;
                }
                let name = board_name(&self.ctx.read(
                    layout::BOARD_NAME,
                    &layout::BOARD_NAME_OCR,
                    &layout::BOARD_NAME_PREPROCESS,
                ));
                if !name.is_empty() {
                    board = Some(name);
                }

                let actions = self.pass();
                passes += 1;
                if self.streak_tripped() {
                    log::info!(
                        "{} consecutive popups, assuming money is spent",
                        self.streak
                    );
                    break BuildExit::PopupStreak;
                }
                if actions == 0 {
                    log::info!("Nothing affordable left on this board");
                    break BuildExit::NothingAffordable;
                }
                self.ctx
                    .state
                    .builder_running
                    .sleep_while_set(Timings::ms(self.ctx.timings().build_pass_ms));
            }
        } else {
            BuildExit::Stopped
        };

        self.persist(board.as_deref());
        self.exit_menu();

        let report = BuildReport {
            exit,
            passes,
            clicks: self.clicks,
            board,
        };
        log::info!(
            "Build cycle finished: {:?} after {} passes, {} clicks",
            report.exit,
            report.passes,
            report.clicks
        );
        self.ctx.state.builder_finished.set(true);
        report
    }

    fn streak_tripped(&self) -> bool {
        self.streak >= self.ctx.settings.building.popup_streak.max(1)
    }

    fn menu_open(&self) -> bool {
        self.ctx.perception.locate(&Template::BuildExit).is_some()
    }

    /// Click the build control until the menu's exit control shows
    fn enter_menu(&self) -> bool {
        let state = &self.ctx.state;
        let retry = Timings::ms(self.ctx.timings().build_menu_ms);
        loop {
            if self.menu_open() {
                return true;
            }
            if !state.builder_running.is_set() {
                return false;
            }
            match self.ctx.perception.locate(&Template::Build) {
                Some(build) => {
                    log::debug!("Opening build menu");
                    self.ctx.input.try_click(build, "build menu");
                }
                None => log::debug!("Build control not visible"),
            }
            state.builder_running.sleep_while_set(retry);
        }
    }

    /// One pass over every slot; returns the number of clicks made
    fn pass(&mut self) -> u32 {
        let state = &self.ctx.state;
        let timings = self.ctx.timings().clone();
        let mut money = state.money.get().unwrap_or(0);
        let mut actions = 0;

        for (slot, region) in layout::BUILDING_SLOTS.iter().enumerate() {
            if self.streak_tripped() || !state.builder_running.is_set() {
                break;
            }
            if !self.menu_open() {
                log::debug!("Build menu lost, reopening");
                if !self.enter_menu() {
                    break;
                }
            }

            let text = self
                .ctx
                .read(*region, &layout::COST_OCR, &layout::COST_PREPROCESS);
            let cost = parse_cost(&text);
            let level = self.levels[slot];
            self.costs.record(slot, level, cost);

            if cost > 0 && money < cost {
                log::debug!(
                    "Slot {}: cost {} > money {}, skipping",
                    slot + 1,
                    cost,
                    money
                );
                continue;
            }
            if cost == 0 {
                log::debug!(
                    "Slot {}: cost unreadable ({:?}), clicking blind",
                    slot + 1,
                    text
                );
            } else {
                log::debug!(
                    "Slot {}: cost {} <= money {}, upgrading",
                    slot + 1,
                    cost,
                    money
                );
            }

            if !self
                .ctx
                .input
                .try_click(self.ctx.center_of(*region), "building slot")
            {
                continue;
            }
            actions += 1;
            self.clicks += 1;
            state
                .builder_running
                .sleep_while_set(Timings::ms(timings.build_click_ms));

            if self.popups.take() {
                self.streak += 1;
                log::debug!("Popup after upgrade ({} in a row)", self.streak);
            } else {
                self.streak = 0;
                self.levels[slot] = (level + 1).min(LEVEL_COUNT - 1);
            }
            money = state
                .money
                .wait_notified(timings.monitor_active())
                .unwrap_or(money);
        }
        actions
    }

    fn persist(&self, board: Option<&str>) {
        let Some(board) = board else {
            log::warn!("Board name unreadable, upgrade costs not saved");
            return;
        };
        let settings = &self.ctx.settings;
        let path = BoardStore::file_for(&settings.data_dir, &settings.window.title);
        let saved = BoardStore::open(&path).and_then(|mut store| {
            let record = store.record_costs(board, &self.costs);
            log::info!(
                "Board #{} {}: total upgrade cost {}",
                record.board_number,
                record.board_name,
                record.total_cost
            );
            store.save()
        });
        if let Err(e) = saved {
            log::warn!("Failed to save board data: {}", e);
        }
    }

    /// Best effort: one click on the exit control, one retry to find it
    fn exit_menu(&self) {
        for attempt in 0..2 {
            if let Some(exit) = self.ctx.perception.locate(&Template::BuildExit) {
                self.ctx.input.try_click(exit, "build menu exit");
                return;
            }
            if attempt == 0 {
                std::thread::sleep(self.ctx.timings().retry());
            }
        }
        log::debug!("Build menu already closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::testing::Harness;
    use std::sync::Arc;

    const EXIT: Point = Point { x: 950, y: 50 };

    fn in_menu(h: &Harness, money: u64, slot_text: &str) {
        h.state().money.set(Some(money));
        h.state().builder_running.set(true);
        h.perception.show(Template::BuildExit, EXIT);
        for region in layout::BUILDING_SLOTS {
            h.perception.set_text(region, slot_text);
        }
    }

    fn slot_centers(h: &Harness) -> Vec<Point> {
        layout::BUILDING_SLOTS
            .iter()
            .map(|r| h.ctx.center_of(*r))
            .collect()
    }

    #[test]
    fn test_insufficient_funds_clicks_nothing() {
        let h = Harness::new();
        in_menu(&h, 500, "1.5K");

        let report = BuildingHandler::new(h.ctx.clone()).run();

        assert_eq!(report.exit, BuildExit::NothingAffordable);
        assert_eq!(report.clicks, 0);
        assert_eq!(report.passes, 1);
        assert_eq!(h.input.click_points(), vec![EXIT]);
        assert!(h.state().builder_finished.is_set());
    }

    #[test]
    fn test_popup_streak_ends_cycle() {
        let h = Harness::new();
        in_menu(&h, 10_000, "");
        let signal = Arc::clone(&h.state().popup);
        h.input.on_click(move || signal.publish());

        let report = BuildingHandler::new(h.ctx.clone()).run();

        assert_eq!(report.exit, BuildExit::PopupStreak);
        assert_eq!(report.clicks, h.ctx.settings.building.popup_streak);
        assert_eq!(report.passes, 1);
        let centers = slot_centers(&h);
        assert_eq!(h.input.click_points()[..3], centers[..3]);
    }

    #[test]
    fn test_costs_saved_per_board() {
        let h = Harness::new();
        in_menu(&h, 2000, "5K");
        h.perception.set_text(layout::BUILDING_SLOTS[0], "1.5K");
        h.perception.set_text(layout::BOARD_NAME, "Downtown 12/30");
        let state = Arc::clone(&h.ctx.state);
        h.input.on_click(move || state.money.set(Some(100)));

        let report = BuildingHandler::new(h.ctx.clone()).run();

        assert_eq!(report.exit, BuildExit::NothingAffordable);
        assert_eq!(report.clicks, 1);
        assert_eq!(report.passes, 2);
        assert_eq!(report.board.as_deref(), Some("Downtown"));

        let path = BoardStore::file_for(&h.ctx.settings.data_dir, &h.ctx.settings.window.title);
        let store = BoardStore::open(path).unwrap();
        let board = store.get("Downtown").unwrap();
        assert_eq!(board.board_number, 1);
        assert_eq!(board.building1[..2], [1500, 1500]);
        assert_eq!(board.building2[0], 5000);
    }

    #[test]
    fn test_opens_menu_first() {
        let h = Harness::new();
        in_menu(&h, 0, "5K");
        h.perception.hide(&Template::BuildExit);
        let build = Point::new(80, 900);
        h.perception.show(Template::Build, build);
        let perception = Arc::clone(&h.perception);
        h.input
            .on_click(move || perception.show(Template::BuildExit, EXIT));

        let report = BuildingHandler::new(h.ctx.clone()).run();

        assert_eq!(report.exit, BuildExit::NothingAffordable);
        assert_eq!(h.input.click_points(), vec![build, EXIT]);
    }

    #[test]
    fn test_cleared_flag_stops_menu_retry() {
        let h = Harness::new();
        h.state().builder_running.set(false);

        let report = BuildingHandler::new(h.ctx.clone()).run();

        assert_eq!(report.exit, BuildExit::Stopped);
        assert_eq!(report.passes, 0);
        assert!(h.state().builder_finished.is_set());
    }
}
