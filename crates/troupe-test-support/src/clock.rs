//! Test clock: deterministic `Clock` implementation for tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use troupe_core::clock::Clock;

/// A clock that returns a fixed point in time, optionally advancing by a
/// fixed step on every reading so successive records sort deterministically.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl FixedClock {
    /// A clock frozen at `now`.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            step: Duration::zero(),
        }
    }

    /// A clock starting at `start` that advances by `step` after each reading.
    #[must_use]
    pub fn ticking(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        let current = *now;
        *now = current + self.step;
        current
    }
}
