//! Popup broadcast signal
//!
//! The UI popup handler is the only publisher. Every consumer owns its own
//! subscription and sees each occurrence at most once, so one consumer
//! draining the signal never hides it from another.

use std::sync::Arc;
use std::time::Duration;

use super::watch::Watched;

/// Broadcast signal raised whenever a popup is dismissed
#[derive(Debug, Default)]
pub struct PopupSignal {
    generation: Watched<u64>,
}

impl PopupSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new popup occurrence and wake all subscribers
    pub fn publish(&self) {
        self.generation.update(|generation| *generation += 1);
    }

    /// Total number of occurrences published
    pub fn occurrences(&self) -> u64 {
        self.generation.get()
    }

    /// Subscribe from now on; earlier occurrences are not delivered
    pub fn subscribe(self: &Arc<Self>) -> PopupSubscription {
        PopupSubscription {
            seen: self.generation.get(),
            signal: Arc::clone(self),
        }
    }
}

/// One consumer's view of the popup signal
#[derive(Debug)]
pub struct PopupSubscription {
    signal: Arc<PopupSignal>,
    seen: u64,
}

impl PopupSubscription {
    /// Number of occurrences not yet consumed by this subscriber
    pub fn pending(&self) -> u64 {
        self.signal.generation.get().saturating_sub(self.seen)
    }

    /// Consume pending occurrences, returning true if there were any
    ///
    /// Occurrences that piled up between two checks collapse into one, the
    /// same way a single "popup observed" flag would.
    pub fn take(&mut self) -> bool {
        let current = self.signal.generation.get();
        let observed = current > self.seen;
        self.seen = current;
        observed
    }

    /// Wait up to `timeout` for a new occurrence and consume it
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let seen = self.seen;
        match self
            .signal
            .generation
            .wait_until_timeout(|generation| *generation > seen, timeout)
        {
            Some(current) => {
                self.seen = current;
                true
            }
            None => false,
        }
    }
}
