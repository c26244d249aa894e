//! Simulated power subsystem.
//!
//! A sleep request long enough to amortize a low-power state drops the caller
//! into the deepest such state. Entry and exit are announced to the registered
//! notifier around the actual thread sleep, on the sleeping thread, the way a
//! kernel idle path calls its power hooks.

use std::hint;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::trace;
use pmcycle::{Clock, Platform, PlatformState, PowerNotifier, SleepState};

use crate::clock::MonotonicClock;

/// Timing of the simulated low-power states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedPlatformConfig {
    /// Minimum sleep that enters light sleep.
    pub light_residency: Duration,
    /// Minimum sleep that enters deep sleep.
    pub deep_residency: Duration,
    /// Time spent between a sleep request and the entry announcement.
    pub entry_latency: Duration,
}

impl Default for SimulatedPlatformConfig {
    fn default() -> Self {
        Self {
            light_residency: Duration::from_millis(200),
            deep_residency: Duration::from_millis(1000),
            entry_latency: Duration::ZERO,
        }
    }
}

pub struct SimulatedPlatform {
    clock: Arc<MonotonicClock>,
    notifier: Arc<dyn PowerNotifier>,
    config: SimulatedPlatformConfig,
}

impl SimulatedPlatform {
    pub fn new(
        clock: Arc<MonotonicClock>,
        notifier: Arc<dyn PowerNotifier>,
        config: SimulatedPlatformConfig,
    ) -> Self {
        Self {
            clock,
            notifier,
            config,
        }
    }

    /// State the platform enters for a sleep of `duration`.
    pub fn select_state(&self, duration: Duration) -> PlatformState {
        if duration >= self.config.deep_residency {
            PlatformState::DeepSleep(1)
        } else if duration >= self.config.light_residency {
            PlatformState::Sleep(1)
        } else {
            PlatformState::Active
        }
    }
}

impl Clock for SimulatedPlatform {
    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}

impl Platform for SimulatedPlatform {
    fn sleep(&self, duration: Duration) {
        let state = self.select_state(duration);
        if state == PlatformState::Active {
            thread::sleep(duration);
            return;
        }

        let latency = self.config.entry_latency.min(duration);
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        trace!("Entering {state:?} for {duration:?}");
        self.notifier.on_state_enter(state);
        thread::sleep(duration - latency);
        self.notifier.on_state_exit(state);
    }

    fn delay(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn busy_wait(&self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            hint::spin_loop();
        }
    }

    fn min_residency(&self, state: SleepState) -> Duration {
        match state {
            SleepState::LightSleep => self.config.light_residency,
            SleepState::DeepSleep => self.config.deep_residency,
        }
    }

    fn console(&self, line: &str) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(bool, PlatformState)>>,
    }

    impl PowerNotifier for Recorder {
        fn on_state_enter(&self, state: PlatformState) {
            self.events.lock().push((true, state));
        }

        fn on_state_exit(&self, state: PlatformState) {
            self.events.lock().push((false, state));
        }
    }

    fn platform() -> (SimulatedPlatform, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = SimulatedPlatformConfig {
            light_residency: Duration::from_millis(5),
            deep_residency: Duration::from_millis(20),
            entry_latency: Duration::ZERO,
        };
        let platform = SimulatedPlatform::new(
            Arc::new(MonotonicClock::new()),
            recorder.clone(),
            config,
        );
        (platform, recorder)
    }

    #[test]
    fn residency_selects_state() {
        let (platform, _) = platform();
        assert_eq!(
            platform.select_state(Duration::from_millis(1)),
            PlatformState::Active
        );
        assert_eq!(
            platform.select_state(Duration::from_millis(5)),
            PlatformState::Sleep(1)
        );
        assert_eq!(
            platform.select_state(Duration::from_millis(19)),
            PlatformState::Sleep(1)
        );
        assert_eq!(
            platform.select_state(Duration::from_millis(20)),
            PlatformState::DeepSleep(1)
        );
    }

    #[test]
    fn sleep_brackets_hooks() {
        let (platform, recorder) = platform();

        platform.sleep(Duration::from_millis(1));
        platform.sleep(Duration::from_millis(8));
        platform.sleep(Duration::from_millis(25));

        assert_eq!(
            *recorder.events.lock(),
            vec![
                (true, PlatformState::Sleep(1)),
                (false, PlatformState::Sleep(1)),
                (true, PlatformState::DeepSleep(1)),
                (false, PlatformState::DeepSleep(1)),
            ]
        );
    }

    #[test]
    fn delay_never_announces_a_state() {
        let (platform, recorder) = platform();
        let start = Instant::now();

        platform.delay(Duration::from_millis(25));

        assert!(start.elapsed() >= Duration::from_millis(25));
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn busy_wait_spins_for_duration() {
        let (platform, _) = platform();
        let start = Instant::now();
        platform.busy_wait(Duration::from_micros(300));
        assert!(start.elapsed() >= Duration::from_micros(300));
    }
}
