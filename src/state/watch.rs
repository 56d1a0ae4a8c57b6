//! Per-attribute synchronization cell
//!
//! Every tracked attribute of the shared state owns its own lock and
//! condition variable. Writers always notify while still holding the lock, so
//! a waiter can never miss the transition it is blocked on.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A value with its own lock and change notification
pub struct Watched<T> {
    value: Mutex<T>,
    changed: Condvar,
    notifications: AtomicU64,
}

impl<T> Watched<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Condvar::new(),
            notifications: AtomicU64::new(0),
        }
    }

    /// Mutate the value in place and notify all waiters
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.value.lock();
        let result = f(&mut *guard);
        self.notify_locked();
        result
    }

    /// Number of notifications issued so far
    pub fn notify_count(&self) -> u64 {
        self.notifications.load(Ordering::SeqCst)
    }

    fn notify_locked(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_all();
    }
}

impl<T: Clone> Watched<T> {
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    /// Store a new value and notify all waiters
    pub fn set(&self, value: T) {
        let mut guard = self.value.lock();
        *guard = value;
        self.notify_locked();
    }

    /// Store a new value, returning the previous one
    pub fn replace(&self, value: T) -> T {
        let mut guard = self.value.lock();
        let previous = std::mem::replace(&mut *guard, value);
        self.notify_locked();
        previous
    }

    /// Block until `pred` holds and return the value that satisfied it
    pub fn wait_until(&self, mut pred: impl FnMut(&T) -> bool) -> T {
        let mut guard = self.value.lock();
        while !pred(&*guard) {
            self.changed.wait(&mut guard);
        }
        guard.clone()
    }

    /// Block until `pred` holds or `timeout` elapses
    ///
    /// Returns `None` on timeout.
    pub fn wait_until_timeout(
        &self,
        mut pred: impl FnMut(&T) -> bool,
        timeout: Duration,
    ) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.value.lock();
        while !pred(&*guard) {
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return pred(&*guard).then(|| guard.clone());
            }
        }
        Some(guard.clone())
    }

    /// Wait for the next notification (or the timeout) and return the value
    /// current at that moment
    pub fn wait_notified(&self, timeout: Duration) -> T {
        let mut guard = self.value.lock();
        let _ = self.changed.wait_for(&mut guard, timeout);
        guard.clone()
    }
}

impl<T: Clone + PartialEq> Watched<T> {
    /// Block until the value differs from `current`, bounded by `timeout`
    pub fn wait_for_change(&self, current: &T, timeout: Duration) -> Option<T> {
        self.wait_until_timeout(|value| value != current, timeout)
    }
}

impl Watched<bool> {
    pub fn is_set(&self) -> bool {
        *self.value.lock()
    }

    /// Sleep for `duration` unless the flag drops to false first
    ///
    /// Returns true if the flag is still set afterwards. Used by every loop
    /// as its interruptible idle interval.
    pub fn sleep_while_set(&self, duration: Duration) -> bool {
        self.wait_until_timeout(|set| !*set, duration).is_none()
    }
}

impl<T: Default> Default for Watched<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Watched<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Watched").field(&*self.value.lock()).finish()
    }
}
