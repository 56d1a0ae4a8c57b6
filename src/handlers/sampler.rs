//! Player-info sampler
//!
//! Five independent loops keep the HUD values in [`GameState`] fresh. None
//! of them reads anything before the home screen is confirmed, and a parse
//! failure never overwrites the last good value.

use std::io;

use super::{Context, RunFlag, TaskHandle};
use crate::game::{layout, parse_money, parse_multiplier, parse_rolls};
use crate::vision::Template;

/// Read the money label; false when the text did not parse
pub fn sample_money(ctx: &Context) -> bool {
    let text = ctx.read(layout::MONEY, &layout::MONEY_OCR, &layout::MONEY_PREPROCESS);
    match parse_money(&text) {
        Some(money) => {
            ctx.state.money.set(Some(money));
            true
        }
        None => {
            log::debug!(
                "Unreadable money {:?}, keeping {:?}",
                text,
                ctx.state.money.get()
            );
            false
        }
    }
}

/// Read the "<rolls>/<capacity>" counter
pub fn sample_rolls(ctx: &Context) -> bool {
    let text = ctx.read(layout::ROLLS, &layout::ROLLS_OCR, &layout::ROLLS_PREPROCESS);
    match parse_rolls(&text) {
        Some((rolls, capacity)) => ctx.state.set_rolls(rolls, capacity),
        None => {
            log::debug!(
                "Unreadable rolls {:?}, keeping {:?}",
                text,
                ctx.state.rolls()
            );
            false
        }
    }
}

/// Read the "x<N>" multiplier badge
pub fn sample_multiplier(ctx: &Context) -> bool {
    let text = ctx.read(
        layout::MULTIPLIER,
        &layout::MULTIPLIER_OCR,
        &layout::MULTIPLIER_PREPROCESS,
    );
    match parse_multiplier(&text) {
        Some(multiplier) => {
            ctx.state.multiplier.set(multiplier);
            true
        }
        None => {
            log::debug!("Unreadable multiplier {:?}", text);
            false
        }
    }
}

/// Track the rolling indicator
pub fn sample_rolling(ctx: &Context) -> bool {
    let rolling = ctx.perception.locate(&Template::Rolling).is_some();
    if ctx.state.is_rolling.get() != rolling {
        log::debug!("Rolling: {}", rolling);
    }
    ctx.state.is_rolling.set(rolling);
    true
}

fn sample_loop(ctx: Context, running: RunFlag, sample: fn(&Context) -> bool) {
    let timings = ctx.timings().clone();
    while running.is_set() {
        if !ctx.state.wait_home_screen(timings.monitor_idle()) {
            continue;
        }
        sample(&ctx);
        running.sleep_while_set(timings.sample());
    }
}

/// The home-screen flag is latched: once confirmed it is never cleared, so
/// this loop only reports the confirmation and then idles.
fn home_screen_loop(ctx: Context, running: RunFlag) {
    let poll = ctx.timings().monitor_idle();
    while running.is_set() {
        if ctx.state.wait_home_screen(poll) {
            log::info!("Home screen confirmed, sampling HUD");
            while running.is_set() {
                running.sleep_while_set(poll);
            }
        }
    }
}

/// The five sampling loops
pub struct Sampler {
    tasks: Vec<TaskHandle>,
}

impl Sampler {
    /// Spawn the sampling thread
    pub fn start(ctx: &Context) -> io::Result<Self> {
        let loops: [(&str, fn(&Context) -> bool); 4] = [
            ("sample-money", sample_money),
            ("sample-rolls", sample_rolls),
            ("sample-multiplier", sample_multiplier),
            ("sample-rolling", sample_rolling),
        ];

        let mut tasks = Vec::with_capacity(loops.len() + 1);
        for (name, sample) in loops {
            let ctx = ctx.clone();
            tasks.push(TaskHandle::spawn(name, move |running| {
                sample_loop(ctx, running, sample)
            })?);
        }
        let home_ctx = ctx.clone();
        tasks.push(TaskHandle::spawn("sample-home", move |running| {
            home_screen_loop(home_ctx, running)
        })?);

        Ok(Self { tasks })
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(TaskHandle::is_running)
    }

    /// Stop sampling and join the thread
    pub fn stop(self) {
        for task in self.tasks {
            task.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::testing::Harness;
    use std::time::Duration;

    #[test]
    fn test_rolls_noise_keeps_last_value() {
        let h = Harness::new();
        h.perception.set_text(layout::ROLLS, "12/50");
        assert!(sample_rolls(&h.ctx));
        assert_eq!(h.state().rolls(), Some(12));

        h.perception.set_text(layout::ROLLS, "O/5O");
        let before = h.state().dice.notify_count();
        assert!(!sample_rolls(&h.ctx));
        assert_eq!(h.state().rolls(), Some(12));
        assert_eq!(h.state().dice.notify_count(), before);
    }

    #[test]
    fn test_money_parse_failure_before_first_read() {
        let h = Harness::new();
        h.perception.set_text(layout::MONEY, "--");
        assert!(!sample_money(&h.ctx));
        assert_eq!(h.state().money.get(), None);

        h.perception.set_text(layout::MONEY, "1,500");
        assert!(sample_money(&h.ctx));
        assert_eq!(h.state().money.get(), Some(1500));
    }

    #[test]
    fn test_multiplier_and_rolling() {
        let h = Harness::new();
        h.perception.set_text(layout::MULTIPLIER, "x5");
        assert!(sample_multiplier(&h.ctx));
        assert_eq!(h.state().multiplier.get(), 5);

        h.perception.show(Template::Rolling, Point::new(10, 10));
        sample_rolling(&h.ctx);
        assert!(h.state().is_rolling.is_set());
        h.perception.hide(&Template::Rolling);
        sample_rolling(&h.ctx);
        assert!(!h.state().is_rolling.is_set());
    }

    #[test]
    fn test_loops_wait_for_home_screen() {
        let h = Harness::new();
        h.perception.set_text(layout::ROLLS, "7/50");
        h.perception.set_text(layout::MONEY, "2000");

        let sampler = Sampler::start(&h.ctx).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(h.state().rolls(), None);

        h.state().confirm_home_screen();
        let dice = h
            .state()
            .dice
            .wait_until_timeout(|dice| dice.rolls.is_some(), Duration::from_secs(2));
        assert_eq!(dice.map(|dice| dice.rolls), Some(Some(7)));
        let money = h
            .state()
            .money
            .wait_until_timeout(|m| m.is_some(), Duration::from_secs(2));
        assert_eq!(money, Some(Some(2000)));

        assert!(sampler.is_running());
        sampler.stop();
        assert!(h.state().in_home_screen.is_set());
    }
}
