//! Control surface
//!
//! Every component the operator can switch is toggled through
//! [`Orchestrator::toggle`]. Background loops are owned as [`TaskHandle`]s;
//! the autoroller itself goes through the shared [`AutorollController`] so
//! the monitors and the operator never race each other on it.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::handlers::{
    AutorollController, AutorollMonitor, BankHeistHandler, BuildingMonitor, Context,
    DestructionHandler, MultiplierMonitor, PopupHandler, Sampler, TaskHandle,
};
use crate::state::{BotStatus, Mode};

/// Something the operator can switch on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Autoroll,
    BankHeist,
    Shutdown,
    Popups,
    BuildingMonitor,
    MultiplierMonitor,
    AutorollMonitor,
    Destruction,
    Idle,
    All,
}

impl Component {
    pub const COMMANDS: [Component; 10] = [
        Component::Autoroll,
        Component::BankHeist,
        Component::Shutdown,
        Component::Popups,
        Component::BuildingMonitor,
        Component::MultiplierMonitor,
        Component::AutorollMonitor,
        Component::Destruction,
        Component::Idle,
        Component::All,
    ];

    /// Loops started by "all", in start order
    const LOOPS: [Component; 6] = [
        Component::BuildingMonitor,
        Component::BankHeist,
        Component::Popups,
        Component::MultiplierMonitor,
        Component::AutorollMonitor,
        Component::Destruction,
    ];

    /// Command word used on the control surface
    pub fn command(self) -> &'static str {
        match self {
            Component::Autoroll => "autoroll",
            Component::BankHeist => "heist",
            Component::Shutdown => "shutdown",
            Component::Popups => "popups",
            Component::BuildingMonitor => "building",
            Component::MultiplierMonitor => "multiplier",
            Component::AutorollMonitor => "autoroll-monitor",
            Component::Destruction => "destruction",
            Component::Idle => "idle",
            Component::All => "all",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

#[derive(Debug, Error)]
#[error("Unknown command '{0}'")]
pub struct UnknownComponent(pub String);

impl FromStr for Component {
    type Err = UnknownComponent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Component::COMMANDS
            .into_iter()
            .find(|c| c.command() == wanted)
            .ok_or_else(|| UnknownComponent(s.to_string()))
    }
}

/// Snapshot of the bot for the operator
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub mode: Mode,
    pub money: Option<u64>,
    pub rolls: Option<u32>,
    pub roll_capacity: u32,
    pub multiplier: u32,
    pub in_home_screen: bool,
    pub idle: bool,
    pub autorolling: bool,
    pub building: bool,
    pub running: Vec<String>,
    pub overlays: usize,
    pub recent_logs: Vec<String>,
}

pub struct Orchestrator {
    ctx: Context,
    controller: Arc<AutorollController>,
    tasks: Mutex<HashMap<Component, TaskHandle>>,
    sampler: Mutex<Option<Sampler>>,
}

impl Orchestrator {
    pub fn new(ctx: Context) -> Self {
        let controller = Arc::new(AutorollController::new(ctx.clone()));
        Self {
            ctx,
            controller,
            tasks: Mutex::new(HashMap::new()),
            sampler: Mutex::new(None),
        }
    }

    /// The shared autoroll controller
    pub fn controller(&self) -> &Arc<AutorollController> {
        &self.controller
    }

    /// Start the HUD sampler if it is not running yet
    pub fn start_sampler(&self) -> io::Result<()> {
        let mut sampler = self.sampler.lock();
        if sampler.is_none() {
            *sampler = Some(Sampler::start(&self.ctx)?);
        }
        Ok(())
    }

    /// Switch `component`; returns whether it is running afterwards
    pub fn toggle(&self, component: Component) -> io::Result<bool> {
        log::info!("Toggling {}", component);
        match component {
            Component::Autoroll => Ok(self.controller.toggle_autoroll()),
            Component::Idle => {
                let idle = !self.ctx.state.idle.is_set();
                self.ctx.state.idle.set(idle);
                log::info!(
                    "Opportunistic handlers {}",
                    if idle { "paused" } else { "resumed" }
                );
                Ok(idle)
            }
            Component::Shutdown => {
                self.shutdown();
                Ok(false)
            }
            Component::All => {
                self.start_all()?;
                Ok(true)
            }
            looped => self.toggle_loop(looped),
        }
    }

    /// Whether `component` is currently on
    pub fn is_running(&self, component: Component) -> bool {
        match component {
            Component::Autoroll => self.controller.is_autorolling(),
            Component::Idle => self.ctx.state.idle.is_set(),
            _ => self
                .tasks
                .lock()
                .get(&component)
                .is_some_and(TaskHandle::is_running),
        }
    }

    fn toggle_loop(&self, component: Component) -> io::Result<bool> {
        let previous = self.tasks.lock().remove(&component);
        if let Some(task) = previous {
            let was_running = task.is_running();
            task.stop();
            if was_running {
                return Ok(false);
            }
        }
        let task = self.spawn(component)?;
        self.tasks.lock().insert(component, task);
        Ok(true)
    }

    fn spawn(&self, component: Component) -> io::Result<TaskHandle> {
        let ctx = self.ctx.clone();
        let controller = Arc::clone(&self.controller);
        let name = component.command();
        match component {
            Component::BankHeist => TaskHandle::spawn(name, move |running| {
                BankHeistHandler::new(ctx).run(&running)
            }),
            Component::Popups => {
                TaskHandle::spawn(name, move |running| PopupHandler::new(ctx).run(&running))
            }
            Component::Destruction => TaskHandle::spawn(name, move |running| {
                DestructionHandler::new(ctx).run(&running)
            }),
            Component::BuildingMonitor => TaskHandle::spawn(name, move |running| {
                BuildingMonitor::new(ctx, controller).run(&running)
            }),
            Component::MultiplierMonitor => TaskHandle::spawn(name, move |running| {
                MultiplierMonitor::new(ctx, controller).run(&running)
            }),
            Component::AutorollMonitor => TaskHandle::spawn(name, move |running| {
                AutorollMonitor::new(ctx, controller).run(&running)
            }),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a background loop", other),
            )),
        }
    }

    /// Start everything, asserting the operator has the home screen showing
    pub fn start_all(&self) -> io::Result<()> {
        self.ctx.state.confirm_home_screen();
        log::info!("Home screen confirmed by operator");
        self.ctx.state.idle.set(false);
        self.start_sampler()?;

        if !self.controller.is_autorolling() {
            self.controller.start_autoroll();
        }
        for component in Component::LOOPS {
            if !self.is_running(component) {
                self.toggle_loop(component)?;
            }
        }
        self.ctx.state.set_status(BotStatus::Running);
        Ok(())
    }

    /// Stop every component; the sampler keeps running
    pub fn shutdown(&self) {
        let tasks: Vec<TaskHandle> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        for task in tasks {
            task.stop();
        }
        self.controller.stop_all();
        self.ctx.state.set_status(BotStatus::Paused);
    }

    /// Stop everything including the sampler
    pub fn close(&self) {
        self.shutdown();
        if let Some(sampler) = self.sampler.lock().take() {
            sampler.stop();
        }
    }

    /// Snapshot the shared state for the status command
    pub fn report(&self) -> StatusReport {
        let state = &self.ctx.state;
        let dice = state.dice.get();
        let mut running: Vec<String> = Component::COMMANDS
            .into_iter()
            .filter(|c| !matches!(c, Component::Idle | Component::Shutdown | Component::All))
            .filter(|c| self.is_running(*c))
            .map(|c| c.to_string())
            .collect();
        running.sort();

        StatusReport {
            status: state.status().to_string(),
            mode: state.mode.active(),
            money: state.money.get(),
            rolls: dice.rolls,
            roll_capacity: dice.capacity,
            multiplier: state.multiplier.get(),
            in_home_screen: state.in_home_screen.is_set(),
            idle: state.idle.is_set(),
            autorolling: state.autoroll_running.is_set(),
            building: state.builder_running.is_set(),
            running,
            overlays: state.overlays.snapshot().len(),
            recent_logs: state.recent_logs.snapshot(),
        }
    }
}
