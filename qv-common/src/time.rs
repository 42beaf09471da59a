//! Wall-clock access
//!
//! Shift detection and the subgroup timing gate work on plant-local wall
//! time. Handlers read it through [`Clock`] so tests can pin the time.

use chrono::{Local, NaiveDateTime};
use std::sync::{Arc, RwLock};

/// Source of the current plant-local time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the host clock in local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock pinned to a settable instant
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Arc<RwLock<NaiveDateTime>>,
}

impl FixedClock {
    pub fn new(instant: NaiveDateTime) -> Self {
        Self {
            instant: Arc::new(RwLock::new(instant)),
        }
    }

    /// Move the clock to a new instant (visible to all clones)
    pub fn set(&self, instant: NaiveDateTime) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard = instant;
    }

    /// Advance the clock by `delta`
    pub fn advance(&self, delta: chrono::Duration) {
        let mut guard = self.instant.write().unwrap_or_else(|e| e.into_inner());
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.instant.read().unwrap_or_else(|e| e.into_inner())
    }
}
