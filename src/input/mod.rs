//! Pointer input
//!
//! All pointer movement goes through one [`Actuator`]. It serializes callers
//! inside the process, takes the cross-process file lock around every
//! sequence, and parks the pointer at the window center afterwards so it
//! never covers a region the next capture will read.

pub mod lock;

use parking_lot::Mutex;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::{InputSettings, Timings};
use crate::geometry::{Point, WindowGeometry};

pub use lock::{InputFileLock, InputLockGuard};

/// Input errors
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Timed out after {0:?} waiting for the input lock")]
    LockTimeout(Duration),
    #[error("Input lock failed: {0}")]
    Lock(#[source] std::io::Error),
    #[error("Input device error: {0}")]
    Device(String),
}

/// Synthetic pointer device
pub trait InputDevice: Send + Sync {
    fn move_to(&self, point: Point) -> Result<(), InputError>;
    fn press_down(&self) -> Result<(), InputError>;
    fn release(&self) -> Result<(), InputError>;

    fn click(&self) -> Result<(), InputError> {
        self.press_down()?;
        self.release()
    }
}

/// Dry-run device that only logs what it would do
#[derive(Debug, Default)]
pub struct LogInput;

impl InputDevice for LogInput {
    fn move_to(&self, point: Point) -> Result<(), InputError> {
        log::info!("[dry-run] move to ({}, {})", point.x, point.y);
        Ok(())
    }

    fn press_down(&self) -> Result<(), InputError> {
        log::info!("[dry-run] press");
        Ok(())
    }

    fn release(&self) -> Result<(), InputError> {
        log::info!("[dry-run] release");
        Ok(())
    }
}

/// Exclusive access to the pointer
pub struct Actuator {
    device: Box<dyn InputDevice>,
    local: Mutex<()>,
    process_lock: Option<InputFileLock>,
    lock_timeout: Duration,
    park_at: Point,
    settle: Duration,
}

impl Actuator {
    pub fn new(
        device: Box<dyn InputDevice>,
        window: &WindowGeometry,
        settings: &InputSettings,
        timings: &Timings,
    ) -> Result<Self, InputError> {
        let process_lock = settings
            .lock_file
            .as_ref()
            .map(InputFileLock::open)
            .transpose()?;
        if let Some(lock) = &process_lock {
            log::info!("Input lock file: {}", lock.path().display());
        }

        Ok(Self {
            device,
            local: Mutex::new(()),
            process_lock,
            lock_timeout: Duration::from_millis(settings.lock_timeout_ms),
            park_at: window.center(),
            settle: Duration::from_millis(timings.pointer_settle_ms),
        })
    }

    /// Run `f` while holding both the in-process and cross-process locks
    fn exclusive<R>(
        &self,
        f: impl FnOnce(&dyn InputDevice) -> Result<R, InputError>,
    ) -> Result<R, InputError> {
        let _local = self.local.lock();
        let _process = match &self.process_lock {
            Some(lock) => Some(lock.acquire(self.lock_timeout)?),
            None => None,
        };
        f(self.device.as_ref())
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }

    /// Move to `point` and click, then park the pointer
    pub fn click_and_park(&self, point: Point) -> Result<(), InputError> {
        self.exclusive(|device| {
            device.move_to(point)?;
            self.settle();
            device.click()?;
            device.move_to(self.park_at)
        })
    }

    /// Press and hold at `point` for `hold`, then park the pointer
    ///
    /// The button is released even when the hold is interrupted by an error.
    pub fn long_press(&self, point: Point, hold: Duration) -> Result<(), InputError> {
        self.exclusive(|device| {
            device.move_to(point)?;
            self.settle();
            device.press_down()?;
            thread::sleep(hold);
            let released = device.release();
            let parked = device.move_to(self.park_at);
            released.and(parked)
        })
    }

    /// Move the pointer to the parking spot
    pub fn park(&self) -> Result<(), InputError> {
        self.exclusive(|device| device.move_to(self.park_at))
    }

    /// Parking spot (window center)
    pub fn park_point(&self) -> Point {
        self.park_at
    }

    /// Click and park, logging and skipping the action on failure
    pub fn try_click(&self, point: Point, what: &str) -> bool {
        match self.click_and_park(point) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Skipped click on {}: {}", what, e);
                false
            }
        }
    }
}
