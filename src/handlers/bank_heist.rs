//! Bank heist handler
//!
//! Clicks the vault door when its template shows. Some heist screens have
//! no recognizable targets, so while the heist banner is confirmed by OCR the
//! handler blind-clicks the cells of the vault grid in turn.

use std::time::Duration;

use super::{Context, RunFlag};
use crate::game::layout;
use crate::geometry::Point;
use crate::vision::{Preprocess, Template};

/// What one scan did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeistAction {
    Door(Point),
    Cell(Point),
    Nothing,
}

pub struct BankHeistHandler {
    ctx: Context,
    next_cell: u32,
}

impl BankHeistHandler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx, next_cell: 0 }
    }

    /// Scan for the heist until `running` is cleared, pausing while idle
    pub fn run(mut self, running: &RunFlag) {
        log::info!("Bank heist handler started");
        while self.ctx.wait_while_idle(running) {
            let action = self.step();
            let pause = self.pause_after(action);
            running.sleep_while_set(pause);
        }
        log::info!("Bank heist handler stopped");
    }

    fn pause_after(&self, action: HeistAction) -> Duration {
        match action {
            HeistAction::Nothing => self.ctx.timings().handler(),
            _ => self.ctx.timings().handler_cooldown(),
        }
    }

    fn banner_confirmed(&self) -> bool {
        let reading = self.ctx.perception.recognize(
            layout::HEIST_BANNER,
            &layout::HEIST_BANNER_OCR,
            &Preprocess::gray(),
        );
        reading.confidence >= layout::HEIST_BANNER_CONFIDENCE
            && reading.text.to_uppercase().contains("HEIST")
    }

    /// One scan: the door first, then a grid cell if the banner is up
    pub fn step(&mut self) -> HeistAction {
        if let Some(door) = self.ctx.perception.locate(&Template::BankHeistDoor) {
            log::info!("Bank heist door at {:?}", door);
            if self.ctx.input.try_click(door, "heist door") {
                return HeistAction::Door(door);
            }
            return HeistAction::Nothing;
        }

        if !self.banner_confirmed() {
            return HeistAction::Nothing;
        }

        let cells = layout::HEIST_GRID_COLS * layout::HEIST_GRID_ROWS;
        let index = self.next_cell % cells;
        self.next_cell = (index + 1) % cells;
        let Some(cell) = layout::HEIST_GRID.grid_cell_center(
            &self.ctx.window,
            layout::HEIST_GRID_COLS,
            layout::HEIST_GRID_ROWS,
            index,
        ) else {
            return HeistAction::Nothing;
        };
        log::debug!("Heist banner confirmed, blind click on cell {}", index);
        if self.ctx.input.try_click(cell, "heist cell") {
            HeistAction::Cell(cell)
        } else {
            HeistAction::Nothing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;

    #[test]
    fn test_door_click() {
        let h = Harness::new();
        let door = Point::new(400, 600);
        h.perception.show(Template::BankHeistDoor, door);

        let mut handler = BankHeistHandler::new(h.ctx.clone());
        assert_eq!(handler.step(), HeistAction::Door(door));
        assert_eq!(h.input.click_points(), vec![door]);
    }

    #[test]
    fn test_grid_round_robin_when_banner_confirmed() {
        let h = Harness::new();
        h.perception.set_reading(layout::HEIST_BANNER, "BANK HEIST", 91.0);

        let mut handler = BankHeistHandler::new(h.ctx.clone());
        let cells = layout::HEIST_GRID_COLS * layout::HEIST_GRID_ROWS;
        let mut clicked = Vec::new();
        for _ in 0..=cells {
            match handler.step() {
                HeistAction::Cell(point) => clicked.push(point),
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(clicked.len(), cells as usize + 1);
        assert_eq!(clicked[0], clicked[cells as usize]);
        assert_ne!(clicked[0], clicked[1]);
    }

    #[test]
    fn test_low_confidence_banner_ignored() {
        let h = Harness::new();
        h.perception.set_reading(layout::HEIST_BANNER, "BANK HEIST", 60.0);

        let mut handler = BankHeistHandler::new(h.ctx.clone());
        assert_eq!(handler.step(), HeistAction::Nothing);
        assert_eq!(h.input.clicks(), 0);
    }

    #[test]
    fn test_idle_gate_pauses() {
        let h = Harness::new();
        h.state().idle.set(true);
        h.perception.show(Template::BankHeistDoor, Point::new(400, 600));

        let task = crate::handlers::TaskHandle::spawn("heist", {
            let ctx = h.ctx.clone();
            move |running| BankHeistHandler::new(ctx).run(&running)
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(h.input.clicks(), 0);

        h.state().idle.set(false);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while h.input.clicks() == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        task.stop();
        assert!(h.input.clicks() > 0);
    }
}
