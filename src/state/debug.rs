//! Debug observability surface
//!
//! Overlay annotations for a live view of what the matcher found, plus a
//! small ring buffer of recent log lines.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::geometry::{Point, Rect};

/// Shape of an overlay annotation, in absolute screen coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayShape {
    Point(Point),
    Rect(Rect),
}

/// A labelled annotation with the time it was recorded
#[derive(Debug, Clone)]
pub struct Overlay {
    pub shape: OverlayShape,
    pub label: String,
    pub recorded_at: Instant,
}

/// Most overlays kept at once, newest win
pub const MAX_OVERLAYS: usize = 256;

/// Overlay list pruned by age, oldest first
#[derive(Debug)]
pub struct Overlays {
    entries: Mutex<VecDeque<Overlay>>,
    max_age: Duration,
}

impl Overlays {
    pub fn new(max_age: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_age,
        }
    }

    /// Record an annotation, dropping expired ones and the oldest past
    /// [`MAX_OVERLAYS`]
    pub fn push(&self, shape: OverlayShape, label: impl Into<String>) {
        let mut entries = self.entries.lock();
        self.prune(&mut entries);
        while entries.len() >= MAX_OVERLAYS {
            entries.pop_front();
        }
        entries.push_back(Overlay {
            shape,
            label: label.into(),
            recorded_at: Instant::now(),
        });
    }

    /// Current overlays; entries older than the max age are dropped
    pub fn snapshot(&self) -> Vec<Overlay> {
        let mut entries = self.entries.lock();
        self.prune(&mut entries);
        entries.iter().cloned().collect()
    }

    fn prune(&self, entries: &mut VecDeque<Overlay>) {
        while entries
            .front()
            .is_some_and(|overlay| overlay.recorded_at.elapsed() >= self.max_age)
        {
            entries.pop_front();
        }
    }
}

impl Default for Overlays {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

/// Bounded buffer of the most recent log lines, oldest dropped first
#[derive(Debug)]
pub struct RecentLogs {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl RecentLogs {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a line, dropping the oldest when full
    pub fn push(&self, line: String) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

impl Default for RecentLogs {
    fn default() -> Self {
        Self::new(5)
    }
}
