//! Destruction handler: clicks attack reticles while destruction mode runs

use super::{Context, RunFlag};
use crate::vision::Template;

pub struct DestructionHandler {
    ctx: Context,
}

impl DestructionHandler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Click destruction targets until `running` is cleared
    pub fn run(self, running: &RunFlag) {
        log::info!("Destruction handler started");
        let timings = self.ctx.timings().clone();
        while self.ctx.wait_while_idle(running) {
            let pause = if self.step() {
                timings.handler() + timings.handler_cooldown()
            } else {
                timings.handler_cooldown()
            };
            running.sleep_while_set(pause);
        }
        log::info!("Destruction handler stopped");
    }

    /// Click the reticle if one is visible
    pub fn step(&self) -> bool {
        match self.ctx.perception.locate(&Template::Target) {
            Some(target) => {
                log::info!("Target at {:?}", target);
                self.ctx.input.try_click(target, "target")
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::testing::Harness;

    #[test]
    fn test_clicks_visible_target() {
        let h = Harness::new();
        let handler = DestructionHandler::new(h.ctx.clone());
        assert!(!handler.step());

        h.perception.show(Template::Target, Point::new(320, 410));
        assert!(handler.step());
        assert_eq!(h.input.click_points(), vec![Point::new(320, 410)]);
        assert_eq!(h.input.last_move(), Some(h.ctx.input.park_point()));
    }
}
