//! Services the engine needs from the platform it validates.

use std::time::Duration;

use crate::state::SleepState;

/// Monotonic uptime source.
///
/// Read from the transition hooks, so implementations must not block.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed origin.
    fn uptime_ms(&self) -> u64;
}

/// Sleep and timing primitives of the platform under test.
///
/// The platform owns the power subsystem: when [`Platform::sleep`] lasts long
/// enough it is expected to drop into a low-power state and announce the
/// transition to its registered [`PowerNotifier`](crate::PowerNotifier).
pub trait Platform: Clock {
    /// Suspends the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Blocks the calling thread for `duration` without entering a
    /// low-power state, however long the wait.
    fn delay(&self, duration: Duration);

    /// Spins for `duration` without yielding to the power subsystem.
    fn busy_wait(&self, duration: Duration);

    /// Minimum time the platform stays in `state` once entered.
    fn min_residency(&self, state: SleepState) -> Duration;

    /// Writes a line straight to the console, bypassing the logger.
    fn console(&self, line: &str);
}
