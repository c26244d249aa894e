//! Monotonic uptime for the host port.

use std::time::Instant;

use pmcycle::Clock;

/// Uptime measured from the moment the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn uptime_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
