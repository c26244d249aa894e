use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Mutex;

use crate::button::{ButtonSource, LevelChangeHandler};
use crate::config::ScenarioConfig;
use crate::context::PmContext;
use crate::error::{PmError, PmResult};
use crate::observer::{PowerNotifier, TransitionObserver};
use crate::platform::{Clock, Platform};
use crate::scenario::SleepCycleTest;
use crate::state::{PlatformState, SleepState};
use crate::sync::Arc;
use crate::worker::WorkerSpec;


/// Clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;
type Watch = Box<dyn Fn(&'static str) + Send + Sync>;

/// Platform running on virtual time.
///
/// Sleeps return immediately after advancing the clock and delivering the
/// transition hooks on the calling thread.
pub struct FakePlatform {
    clock: Arc<ManualClock>,
    notifier: Arc<dyn PowerNotifier>,
    light_residency: Duration,
    deep_residency: Duration,
    entry_latency: Duration,
    during_deep_sleep: Mutex<Option<Hook>>,
    watch: Mutex<Option<Watch>>,
    console: Mutex<Vec<String>>,
    busy_waits: AtomicU32,
    delays: AtomicU32,
}

impl FakePlatform {
    pub fn new(clock: Arc<ManualClock>, notifier: Arc<dyn PowerNotifier>) -> Self {
        Self {
            clock,
            notifier,
            light_residency: Duration::from_millis(100),
            deep_residency: Duration::from_millis(1000),
            entry_latency: Duration::ZERO,
            during_deep_sleep: Mutex::new(None),
            watch: Mutex::new(None),
            console: Mutex::new(Vec::new()),
            busy_waits: AtomicU32::new(0),
            delays: AtomicU32::new(0),
        }
    }

    /// Time between the sleep request and the deep-sleep entry hook.
    pub fn with_entry_latency(mut self, latency: Duration) -> Self {
        self.entry_latency = latency;
        self
    }

    /// Runs `hook` between the entry and exit of every deep sleep.
    pub fn during_deep_sleep(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.during_deep_sleep.lock().unwrap() = Some(Box::new(hook));
    }

    /// Runs `hook` with the name of every platform call: `"delay"`,
    /// `"deep sleep"` (once entered) and `"console"`.
    pub fn watch(&self, hook: impl Fn(&'static str) + Send + Sync + 'static) {
        *self.watch.lock().unwrap() = Some(Box::new(hook));
    }

    fn notify(&self, call: &'static str) {
        if let Some(hook) = self.watch.lock().unwrap().as_ref() {
            hook(call);
        }
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.console.lock().unwrap().clone()
    }

    pub fn busy_waits(&self) -> u32 {
        self.busy_waits.load(Ordering::SeqCst)
    }

    pub fn delays(&self) -> u32 {
        self.delays.load(Ordering::SeqCst)
    }

    fn target_state(&self, duration: Duration) -> Option<PlatformState> {
        if duration >= self.deep_residency {
            Some(PlatformState::DeepSleep(1))
        } else if duration >= self.light_residency {
            Some(PlatformState::Sleep(1))
        } else {
            None
        }
    }
}

impl Clock for FakePlatform {
    fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }
}

impl Platform for FakePlatform {
    fn sleep(&self, duration: Duration) {
        let Some(state) = self.target_state(duration) else {
            self.clock.advance(duration);
            return;
        };

        let deep = state == PlatformState::DeepSleep(1);
        let latency = if deep { self.entry_latency } else { Duration::ZERO };
        self.clock.advance(latency);
        self.notifier.on_state_enter(state);
        if deep {
            self.notify("deep sleep");
            if let Some(hook) = self.during_deep_sleep.lock().unwrap().as_ref() {
                hook();
            }
        }
        self.clock.advance(duration.saturating_sub(latency));
        self.notifier.on_state_exit(state);
    }

    fn delay(&self, duration: Duration) {
        self.delays.fetch_add(1, Ordering::SeqCst);
        self.notify("delay");
        self.clock.advance(duration);
    }

    fn busy_wait(&self, duration: Duration) {
        self.busy_waits.fetch_add(1, Ordering::SeqCst);
        self.clock.advance(duration);
    }

    fn min_residency(&self, state: SleepState) -> Duration {
        match state {
            SleepState::LightSleep => self.light_residency,
            SleepState::DeepSleep => self.deep_residency,
        }
    }

    fn console(&self, line: &str) {
        self.notify("console");
        self.console.lock().unwrap().push(line.to_owned());
    }
}

/// Button whose levels are set by the test.
#[derive(Default)]
pub struct ScriptedButton {
    handler: Mutex<Option<Arc<dyn LevelChangeHandler>>>,
    broken: bool,
}

impl ScriptedButton {
    pub fn new() -> Self {
        Self::default()
    }

    /// A button whose binding always fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn press(&self) {
        self.level(0);
    }

    pub fn release(&self) {
        self.level(1);
    }

    fn level(&self, level: i32) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler.on_level_change(level);
        }
    }
}

impl ButtonSource for ScriptedButton {
    fn configure(&self, handler: Arc<dyn LevelChangeHandler>) -> PmResult<()> {
        if self.broken {
            return Err(PmError::ButtonBinding("sw0 not ready".into()));
        }
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }
}

/// Workers fast enough to tick many times during a test.
pub fn fast_workers() -> Vec<WorkerSpec> {
    vec![
        WorkerSpec::new("A", Duration::from_millis(1)),
        WorkerSpec::new("B", Duration::from_millis(3)),
    ]
}

/// A bench on virtual time with fast workers and no idle entry delay.
pub fn bench(
    config: ScenarioConfig,
    platform: impl FnOnce(Arc<ManualClock>, Arc<dyn PowerNotifier>) -> FakePlatform,
) -> (SleepCycleTest<FakePlatform>, Arc<FakePlatform>) {
    let clock = Arc::new(ManualClock::new());
    let observer = Arc::new(TransitionObserver::new(
        Arc::new(PmContext::new()),
        clock.clone(),
    ));
    let notifier: Arc<dyn PowerNotifier> = observer.clone();
    let platform = Arc::new(platform(clock, notifier));
    let test = SleepCycleTest::new(Arc::clone(&platform), observer, config);
    (test, platform)
}

pub fn test_config() -> crate::config::ScenarioConfigBuilder {
    ScenarioConfig::builder()
        .workers(fast_workers())
        .idle_entry_delay(Duration::ZERO)
}
