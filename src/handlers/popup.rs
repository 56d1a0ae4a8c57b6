//! UI popup handler
//!
//! Dismisses dialogs by clicking any known close template, or the close "x"
//! read by OCR when no template matches. It is the only publisher of the
//! popup signal: every dismissal is broadcast to all subscribers.

use rand::seq::SliceRandom;

use super::{Context, RunFlag};
use crate::game::layout;
use crate::vision::{Preprocess, Template};

/// Template clicks in a row before assuming the screen is stuck
pub const STUCK_CLICKS: u32 = 5;

pub struct PopupHandler {
    ctx: Context,
    templates: Vec<Template>,
    consecutive: u32,
}

impl PopupHandler {
    pub fn new(ctx: Context) -> Self {
        let templates = ctx.perception.ui_templates();
        if templates.is_empty() {
            log::warn!("No popup templates available, only the OCR close button is checked");
        } else {
            log::debug!("{} popup templates loaded", templates.len());
        }
        Self {
            ctx,
            templates,
            consecutive: 0,
        }
    }

    /// Dismiss popups until `running` is cleared, pausing while idle
    pub fn run(mut self, running: &RunFlag) {
        log::info!("Popup handler started");
        while self.ctx.wait_while_idle(running) {
            self.step();
            running.sleep_while_set(self.ctx.timings().handler());
        }
        log::info!("Popup handler stopped");
    }

    /// One scan; returns true if a popup was dismissed
    pub fn step(&mut self) -> bool {
        // Fresh random order every scan
        let mut templates = self.templates.clone();
        templates.shuffle(&mut rand::rng());

        for template in &templates {
            let Some(point) = self.ctx.perception.locate(template) else {
                continue;
            };
            log::debug!("Popup {:?} at {:?}", template, point);
            if !self.ctx.input.try_click(point, "popup") {
                return false;
            }
            self.consecutive += 1;
            if self.consecutive >= STUCK_CLICKS {
                log::warn!(
                    "{} popup clicks in a row, clicking window center",
                    self.consecutive
                );
                self.ctx
                    .input
                    .try_click(self.ctx.window.center(), "window center");
                self.consecutive = 0;
            }
            self.ctx.state.popup.publish();
            return true;
        }

        let text = self.ctx.read(
            layout::POPUP_CLOSE,
            &layout::POPUP_CLOSE_OCR,
            &Preprocess::gray(),
        );
        if text.to_lowercase().contains('x') {
            log::debug!("Close button read as {:?}", text);
            if self
                .ctx
                .input
                .try_click(self.ctx.center_of(layout::POPUP_CLOSE), "popup close")
            {
                self.ctx.state.popup.publish();
                return true;
            }
            return false;
        }

        self.consecutive = 0;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::testing::Harness;

    #[test]
    fn test_template_click_publishes() {
        let h = Harness::new();
        let close = Template::Ui("close.png".into());
        h.perception.set_ui_templates(vec![close.clone(), Template::Ui("ok.png".into())]);
        h.perception.show(close, Point::new(700, 200));
        let mut subscriber = h.state().popup.subscribe();

        let mut handler = PopupHandler::new(h.ctx.clone());
        assert!(handler.step());

        assert_eq!(h.input.click_points(), vec![Point::new(700, 200)]);
        assert!(subscriber.take());
    }

    #[test]
    fn test_every_subscriber_sees_dismissal() {
        let h = Harness::new();
        h.perception.set_text(layout::POPUP_CLOSE, "X");
        let mut first = h.state().popup.subscribe();
        let mut second = h.state().popup.subscribe();

        let mut handler = PopupHandler::new(h.ctx.clone());
        assert!(handler.step());

        assert_eq!(
            h.input.click_points(),
            vec![h.ctx.center_of(layout::POPUP_CLOSE)]
        );
        assert!(first.take());
        assert!(!first.take());
        assert!(second.take());
    }

    #[test]
    fn test_stuck_popup_gets_blind_click() {
        let h = Harness::new();
        let close = Template::Ui("close.png".into());
        h.perception.set_ui_templates(vec![close.clone()]);
        h.perception.show(close, Point::new(700, 200));

        let mut handler = PopupHandler::new(h.ctx.clone());
        for _ in 0..STUCK_CLICKS {
            assert!(handler.step());
        }

        let points = h.input.click_points();
        assert_eq!(points.len(), STUCK_CLICKS as usize + 1);
        assert_eq!(points.last(), Some(&h.ctx.window.center()));
        assert_eq!(h.state().popup.occurrences(), STUCK_CLICKS as u64);
    }

    #[test]
    fn test_clear_screen_does_nothing() {
        let h = Harness::new();
        let templates = vec![
            Template::Ui("close.png".into()),
            Template::Ui("ok.png".into()),
        ];
        h.perception.set_ui_templates(templates.clone());
        let mut handler = PopupHandler::new(h.ctx.clone());
        assert!(!handler.step());
        for template in &templates {
            assert_eq!(h.perception.locate_count(template), 1);
        }
        assert_eq!(h.input.clicks(), 0);
        assert_eq!(h.state().popup.occurrences(), 0);
    }
}
