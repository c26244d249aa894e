//! Host port for the sleep-cycle engine.
//!
//! Replaces the board's power subsystem with a simulation driven by sleep
//! durations, and the board's push button with a debounced software button.
//! [`PosixBench`] wires both to a [`SleepCycleTest`].

pub mod button;
pub mod clock;
pub mod platform;

use std::sync::Arc;

use pmcycle::{PmContext, ScenarioConfig, SleepCycleTest, TransitionObserver};

pub use button::{spawn_presser, Debouncer, SimulatedButton, DEFAULT_DEBOUNCE_COUNT};
pub use clock::MonotonicClock;
pub use platform::{SimulatedPlatform, SimulatedPlatformConfig};

/// Name of the button the bench binds.
pub const BUTTON_NAME: &str = "sw0";

/// A sleep-cycle test running on the simulated platform.
pub struct PosixBench {
    test: SleepCycleTest<SimulatedPlatform>,
    button: SimulatedButton,
    clock: Arc<MonotonicClock>,
}

impl PosixBench {
    pub fn new(platform: SimulatedPlatformConfig, scenario: ScenarioConfig) -> Self {
        Self::with_button(platform, scenario, SimulatedButton::new(BUTTON_NAME))
    }

    pub fn with_button(
        platform: SimulatedPlatformConfig,
        scenario: ScenarioConfig,
        button: SimulatedButton,
    ) -> Self {
        let clock = Arc::new(MonotonicClock::new());
        let observer = Arc::new(TransitionObserver::new(
            Arc::new(PmContext::new()),
            clock.clone(),
        ));
        let platform = Arc::new(SimulatedPlatform::new(
            Arc::clone(&clock),
            observer.clone(),
            platform,
        ));
        let test = SleepCycleTest::new(platform, observer, scenario)
            .with_button(Arc::new(button.clone()));

        Self {
            test,
            button,
            clock,
        }
    }

    pub fn test(&self) -> &SleepCycleTest<SimulatedPlatform> {
        &self.test
    }

    pub fn button(&self) -> &SimulatedButton {
        &self.button
    }

    pub fn clock(&self) -> &Arc<MonotonicClock> {
        &self.clock
    }
}
