//! Scenario timing and policy configuration.

use core::time::Duration;

use crate::idle::Timeout;
use crate::observer::DEFAULT_LATENCY_THRESHOLD;
use crate::worker::WorkerSpec;

/// Time added to the light-sleep residency so the platform settles into it.
pub const LIGHT_SLEEP_MARGIN: Duration = Duration::from_millis(300);
/// Time added to the deep-sleep residency so the platform settles into it.
pub const DEEP_SLEEP_MARGIN: Duration = Duration::from_millis(1100);
/// Busy-wait after every wake-up.
pub const WAKE_BUSY_WAIT: Duration = Duration::from_micros(100);
/// Delay carried by idle requests from the button.
pub const DEEP_IDLE_ENTRY_DELAY: Duration = Duration::from_millis(100);

/// Configuration shared by the three scenario drivers.
///
/// Sleep durations are the platform's minimum residency for a state plus the
/// margin for that state.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub light_margin: Duration,
    pub deep_margin: Duration,
    pub busy_wait: Duration,
    pub latency_threshold: Duration,
    pub workers: Vec<WorkerSpec>,
    /// How long the asynchronous driver waits for each idle request.
    pub idle_timeout: Timeout,
    /// Delay attached to requests made by button presses.
    pub idle_entry_delay: Duration,
    /// Upper bound on each sleep inside a deep-idle bout.
    pub max_idle_residency: Option<Duration>,
    /// Upper bound on sleeps per deep-idle bout; `None` sleeps until exit.
    pub max_idle_attempts: Option<u32>,
    /// Submit one idle request as soon as the asynchronous driver starts.
    pub kickoff_request: bool,
    pub press_requests_idle: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            light_margin: LIGHT_SLEEP_MARGIN,
            deep_margin: DEEP_SLEEP_MARGIN,
            busy_wait: WAKE_BUSY_WAIT,
            latency_threshold: DEFAULT_LATENCY_THRESHOLD,
            workers: WorkerSpec::defaults(),
            idle_timeout: Timeout::Forever,
            idle_entry_delay: DEEP_IDLE_ENTRY_DELAY,
            max_idle_residency: None,
            max_idle_attempts: None,
            kickoff_request: false,
            press_requests_idle: true,
        }
    }
}

impl ScenarioConfig {
    pub fn builder() -> ScenarioConfigBuilder {
        ScenarioConfigBuilder::default()
    }
}

/// Builder for [`ScenarioConfig`].
#[derive(Debug, Clone, Default)]
pub struct ScenarioConfigBuilder {
    config: ScenarioConfig,
}

impl ScenarioConfigBuilder {
    /// Sets the margins added to the light and deep residencies.
    pub fn margins(mut self, light: Duration, deep: Duration) -> Self {
        self.config.light_margin = light;
        self.config.deep_margin = deep;
        self
    }

    pub fn busy_wait(mut self, busy_wait: Duration) -> Self {
        self.config.busy_wait = busy_wait;
        self
    }

    /// Sets the deep-sleep entry latency above which a warning is logged.
    pub fn latency_threshold(mut self, threshold: Duration) -> Self {
        self.config.latency_threshold = threshold;
        self
    }

    /// Replaces the worker task list.
    pub fn workers(mut self, workers: Vec<WorkerSpec>) -> Self {
        self.config.workers = workers;
        self
    }

    /// Enables or disables the named worker.
    pub fn enable_worker(mut self, name: &str, enabled: bool) -> Self {
        if let Some(spec) = self.config.workers.iter_mut().find(|w| w.name == name) {
            spec.enabled = enabled;
        }
        self
    }

    pub fn idle_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.config.idle_timeout = timeout.into();
        self
    }

    pub fn idle_entry_delay(mut self, delay: Duration) -> Self {
        self.config.idle_entry_delay = delay;
        self
    }

    pub fn max_idle_residency(mut self, residency: Duration) -> Self {
        self.config.max_idle_residency = Some(residency);
        self
    }

    pub fn max_idle_attempts(mut self, attempts: u32) -> Self {
        self.config.max_idle_attempts = Some(attempts);
        self
    }

    pub fn kickoff_request(mut self, enabled: bool) -> Self {
        self.config.kickoff_request = enabled;
        self
    }

    pub fn press_requests_idle(mut self, enabled: bool) -> Self {
        self.config.press_requests_idle = enabled;
        self
    }

    pub fn build(self) -> ScenarioConfig {
        self.config
    }
}
