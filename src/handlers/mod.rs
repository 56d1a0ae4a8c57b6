//! Monitors and handlers
//!
//! Every loop runs on its own named thread and talks to the rest of the bot
//! only through [`GameState`], the [`Perception`] service and the shared
//! [`Actuator`]. Monitors decide; handlers act.

pub mod autoroll;
pub mod autoroll_monitor;
pub mod bank_heist;
pub mod building;
pub mod building_monitor;
pub mod destruction;
pub mod multiplier;
pub mod popup;
pub mod sampler;

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{Settings, Timings};
use crate::geometry::{Point, RegionPct, WindowGeometry};
use crate::input::Actuator;
use crate::state::{GameState, Watched};
use crate::vision::{OcrOptions, Perception, Preprocess};

pub use autoroll::{AutorollController, AutorollExit, AutorollHandler};
pub use autoroll_monitor::{AutorollDecision, AutorollMonitor};
pub use bank_heist::BankHeistHandler;
pub use building::{BuildExit, BuildReport, BuildingHandler};
pub use building_monitor::BuildingMonitor;
pub use destruction::DestructionHandler;
pub use multiplier::{MultiplierExit, MultiplierHandler, MultiplierMonitor};
pub use popup::PopupHandler;
pub use sampler::Sampler;

/// Run flag of a background loop; clearing it asks the loop to exit
pub type RunFlag = Arc<Watched<bool>>;

/// Everything a handler needs, cheap to clone into each thread
#[derive(Clone)]
pub struct Context {
    pub state: Arc<GameState>,
    pub perception: Arc<dyn Perception>,
    pub input: Arc<Actuator>,
    pub settings: Arc<Settings>,
    pub window: WindowGeometry,
}

impl Context {
    pub fn new(
        state: Arc<GameState>,
        perception: Arc<dyn Perception>,
        input: Arc<Actuator>,
        settings: Arc<Settings>,
        window: WindowGeometry,
    ) -> Self {
        Self {
            state,
            perception,
            input,
            settings,
            window,
        }
    }

    /// Loop timings from the settings
    pub fn timings(&self) -> &Timings {
        &self.settings.timings
    }

    /// Read text from a window region
    pub fn read(&self, region: RegionPct, options: &OcrOptions, preprocess: &Preprocess) -> String {
        self.perception.read_text(region, options, preprocess)
    }

    /// Absolute center of a window region
    pub fn center_of(&self, region: RegionPct) -> Point {
        region.center(&self.window)
    }

    /// Block while the shared idle gate is closed; false once `running`
    /// is cleared
    pub fn wait_while_idle(&self, running: &RunFlag) -> bool {
        let poll = self.timings().monitor_idle();
        while running.is_set() && self.state.idle.is_set() {
            self.state.idle.wait_until_timeout(|idle| !*idle, poll);
        }
        running.is_set()
    }
}

/// Spawn a named thread
pub fn spawn_named<T, F>(name: &str, body: F) -> io::Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(body)
}

/// Join a worker thread, logging a panic instead of propagating it
pub fn join_logged<T>(name: &str, handle: JoinHandle<T>) -> Option<T> {
    match handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            log::error!("{} thread panicked", name);
            None
        }
    }
}

/// A long-running loop owned by the control surface
pub struct TaskHandle {
    name: String,
    running: RunFlag,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Start `body` on its own thread with a fresh run flag
    pub fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce(RunFlag) + Send + 'static,
    {
        let running: RunFlag = Arc::new(Watched::new(true));
        let flag = Arc::clone(&running);
        let thread = spawn_named(name, move || body(flag))?;
        log::info!("Started {}", name);
        Ok(Self {
            name: name.to_string(),
            running,
            thread: Some(thread),
        })
    }

    /// Thread name, used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the flag is set and the thread has not exited on its own
    pub fn is_running(&self) -> bool {
        self.running.is_set() && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Clear the run flag and wait for the loop to exit
    pub fn stop(mut self) {
        self.running.set(false);
        if let Some(thread) = self.thread.take() {
            join_logged(&self.name, thread);
        }
        log::info!("Stopped {}", self.name);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.running.set(false);
    }
}
