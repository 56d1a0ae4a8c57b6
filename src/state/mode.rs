//! Automation mode arbiter
//!
//! Rolling, building, and multiplier fixing all need the board and the
//! pointer to themselves. The arbiter is the only writer of the active mode:
//! handlers request a mode and block until it is granted, and the grant is
//! released when the returned guard drops.
//!
//! Building and multiplier fixing are *exclusive* requests. Once one is
//! reserved, no new rolling grant is handed out, which gives the reserving
//! monitor a window to stop the autoroller and take over.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What the bot is currently allowed to do with the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Idle,
    Rolling,
    Building,
    FixingMultiplier,
}

impl Mode {
    /// Exclusive modes preempt rolling
    pub fn is_exclusive(self) -> bool {
        matches!(self, Mode::Building | Mode::FixingMultiplier)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Rolling => "rolling",
            Mode::Building => "building",
            Mode::FixingMultiplier => "fixing multiplier",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct ArbiterState {
    active: Mode,
    /// Exclusive requests waiting for the board
    reserved: Vec<Mode>,
}

impl ArbiterState {
    fn can_grant(&self, mode: Mode) -> bool {
        if self.active != Mode::Idle {
            return false;
        }
        if mode.is_exclusive() {
            // First come, first served among exclusive requests
            self.reserved.first() == Some(&mode)
        } else {
            self.reserved.is_empty()
        }
    }
}

/// Single mediator for the active automation mode
#[derive(Debug)]
pub struct ModeArbiter {
    state: Mutex<ArbiterState>,
    changed: Condvar,
}

impl ModeArbiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ArbiterState {
                active: Mode::Idle,
                reserved: Vec::new(),
            }),
            changed: Condvar::new(),
        })
    }

    /// Currently granted mode
    pub fn active(&self) -> Mode {
        self.state.lock().active
    }

    /// True while an exclusive mode is active or waiting to become active
    pub fn is_contended(&self) -> bool {
        let state = self.state.lock();
        state.active.is_exclusive() || !state.reserved.is_empty()
    }

    /// True while `mode` is active or reserved
    pub fn is_claimed(&self, mode: Mode) -> bool {
        let state = self.state.lock();
        state.active == mode || state.reserved.contains(&mode)
    }

    /// Block until no exclusive mode is active or reserved, bounded by
    /// `timeout`. Returns true if the board became uncontended.
    pub fn wait_uncontended(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.active.is_exclusive() || !state.reserved.is_empty() {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return !(state.active.is_exclusive() || !state.reserved.is_empty());
            }
        }
        true
    }

    /// Grant `mode` immediately if the board is free
    pub fn try_request(self: &Arc<Self>, mode: Mode) -> Option<ModeGrant> {
        if mode.is_exclusive() {
            let reservation = self.reserve(mode);
            return reservation.wait_timeout(Duration::ZERO);
        }

        let mut state = self.state.lock();
        if !state.can_grant(mode) {
            return None;
        }
        state.active = mode;
        self.changed.notify_all();
        log::debug!("Mode granted: {}", mode);
        Some(ModeGrant {
            arbiter: Arc::clone(self),
            mode,
        })
    }

    /// Reserve an exclusive mode; rolling is refused from this point on
    pub fn reserve(self: &Arc<Self>, mode: Mode) -> Reservation {
        debug_assert!(mode.is_exclusive());
        let mut state = self.state.lock();
        state.reserved.push(mode);
        self.changed.notify_all();
        log::debug!("Mode reserved: {}", mode);
        Reservation {
            arbiter: Arc::clone(self),
            mode,
            pending: true,
        }
    }

    fn release(&self, mode: Mode) {
        let mut state = self.state.lock();
        if state.active == mode {
            state.active = Mode::Idle;
        }
        self.changed.notify_all();
        log::debug!("Mode released: {}", mode);
    }

    fn cancel(&self, mode: Mode) {
        let mut state = self.state.lock();
        if let Some(pos) = state.reserved.iter().position(|m| *m == mode) {
            state.reserved.remove(pos);
        }
        self.changed.notify_all();
    }
}

/// A pending exclusive request
#[derive(Debug)]
pub struct Reservation {
    arbiter: Arc<ModeArbiter>,
    mode: Mode,
    pending: bool,
}

impl Reservation {
    /// Block until the reserved mode is granted
    pub fn wait(mut self) -> ModeGrant {
        let arbiter = Arc::clone(&self.arbiter);
        let mut state = arbiter.state.lock();
        while !state.can_grant(self.mode) {
            arbiter.changed.wait(&mut state);
        }
        self.take_locked(&mut state)
    }

    /// Block until granted or the timeout elapses; the reservation is
    /// cancelled on timeout
    pub fn wait_timeout(mut self, timeout: Duration) -> Option<ModeGrant> {
        let arbiter = Arc::clone(&self.arbiter);
        let deadline = Instant::now() + timeout;
        let mut state = arbiter.state.lock();
        while !state.can_grant(self.mode) {
            if arbiter.changed.wait_until(&mut state, deadline).timed_out()
                && !state.can_grant(self.mode)
            {
                return None;
            }
        }
        Some(self.take_locked(&mut state))
    }

    fn take_locked(&mut self, state: &mut ArbiterState) -> ModeGrant {
        if let Some(pos) = state.reserved.iter().position(|m| *m == self.mode) {
            state.reserved.remove(pos);
        }
        state.active = self.mode;
        self.pending = false;
        self.arbiter.changed.notify_all();
        log::debug!("Mode granted: {}", self.mode);
        ModeGrant {
            arbiter: Arc::clone(&self.arbiter),
            mode: self.mode,
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.pending {
            self.arbiter.cancel(self.mode);
        }
    }
}

/// Proof of owning a mode; releases it on drop
#[derive(Debug)]
pub struct ModeGrant {
    arbiter: Arc<ModeArbiter>,
    mode: Mode,
}

impl ModeGrant {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl Drop for ModeGrant {
    fn drop(&mut self) {
        self.arbiter.release(self.mode);
    }
}
