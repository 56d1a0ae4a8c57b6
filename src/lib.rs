//! Dicebot - screen automation for a dice-board mobile game
//!
//! The bot watches an emulator window, reads the HUD with template matching
//! and OCR, and drives the game with synthetic pointer input. Its core is a
//! set of independent loops sharing [`state::GameState`]:
//!
//! - the sampler keeps money, rolls and the multiplier fresh
//! - monitors decide when to roll, build, or fix the multiplier
//! - handlers do the clicking, one board-owning mode at a time
//!
//! ## Modes
//!
//! Rolling, building and multiplier fixing never overlap. The
//! [`state::ModeArbiter`] hands out one mode at a time, and the building and
//! multiplier monitors reserve their mode before stopping the autoroller.

pub mod config;
pub mod game;
pub mod geometry;
pub mod handlers;
pub mod input;
pub mod logging;
pub mod orchestrator;
pub mod state;
pub mod vision;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::geometry::WindowGeometry;
use crate::handlers::Context;
use crate::input::{Actuator, InputDevice, InputError};
use crate::orchestrator::Orchestrator;
use crate::state::GameState;
use crate::vision::{Perception, VisionError};

/// Startup errors
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A wired-up bot for one emulator window
pub struct Bot {
    pub state: Arc<GameState>,
    pub orchestrator: Orchestrator,
}

impl Bot {
    /// Wire the shared state, perception and input device together
    pub fn new(
        settings: Settings,
        state: Arc<GameState>,
        perception: Arc<dyn Perception>,
        device: Box<dyn InputDevice>,
        window: WindowGeometry,
    ) -> Result<Self, BotError> {
        let actuator = Actuator::new(device, &window, &settings.input, &settings.timings)?;
        let ctx = Context::new(
            Arc::clone(&state),
            perception,
            Arc::new(actuator),
            Arc::new(settings),
            window,
        );
        Ok(Self {
            state,
            orchestrator: Orchestrator::new(ctx),
        })
    }

    /// Start sampling the HUD; everything else waits for the operator
    pub fn start(&self) -> Result<(), BotError> {
        self.orchestrator.start_sampler()?;
        Ok(())
    }

    /// Stop every loop
    pub fn close(&self) {
        self.orchestrator.close();
    }
}
