//! Sleep-cycle test drivers.
//!
//! Three drivers share the same sleep primitives:
//!
//! - [`SleepCycleTest::run_singlethread`] sleeps the caller alone, alternating
//!   light and deep sleep.
//! - [`SleepCycleTest::run_multithread`] does the same while background
//!   workers load the system, parking them around every sleep.
//! - [`SleepCycleTest::run_multithread_async`] only sleeps when an external
//!   event asks for deep idle, and stays there until the event path releases
//!   it.
//!
//! Every driver zeroes the counters before it starts, enables the transition
//! hooks, and hands the counters to the [`CycleValidator`] at the end. Worker
//! tasks are always stopped and joined before a driver returns.

use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;

use log::{debug, error, info, warn};

use crate::button::{ButtonSource, IdleButtonHandler};
use crate::config::ScenarioConfig;
use crate::context::PmContext;
use crate::error::{PmError, PmResult};
use crate::idle::IdleController;
use crate::observer::TransitionObserver;
use crate::platform::Platform;
use crate::state::SleepState;
use crate::sync::Arc;
use crate::validator::{CycleReport, CycleValidator};
use crate::worker::WorkerPool;

/// Where a driver currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScenarioPhase {
    ActiveWithTasks = 0,
    TasksSuspended,
    AwaitingIdleRequest,
    EnteringSleep,
    InSleep,
    ExitedSleep,
    Stopped,
}

impl ScenarioPhase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::ActiveWithTasks,
            1 => Self::TasksSuspended,
            2 => Self::AwaitingIdleRequest,
            3 => Self::EnteringSleep,
            4 => Self::InSleep,
            5 => Self::ExitedSleep,
            _ => Self::Stopped,
        }
    }
}

/// A sleep-cycle test bench bound to one platform.
pub struct SleepCycleTest<P: Platform> {
    platform: Arc<P>,
    observer: Arc<TransitionObserver>,
    idle: Arc<IdleController>,
    validator: CycleValidator,
    config: ScenarioConfig,
    button: Option<Arc<dyn ButtonSource>>,
    phase: AtomicU8,
}

impl<P: Platform> SleepCycleTest<P> {
    /// Creates a bench around `platform`.
    ///
    /// `observer` must be the notifier registered with the platform's power
    /// subsystem; its context becomes the context of the bench.
    pub fn new(platform: Arc<P>, observer: Arc<TransitionObserver>, config: ScenarioConfig) -> Self {
        observer.set_latency_threshold(config.latency_threshold);
        let ctx = Arc::clone(observer.context());
        Self {
            platform,
            idle: Arc::new(IdleController::new(Arc::clone(&ctx))),
            validator: CycleValidator::new(ctx),
            observer,
            config,
            button: None,
            phase: AtomicU8::new(ScenarioPhase::Stopped as u8),
        }
    }

    /// Event source bound by the asynchronous driver.
    pub fn with_button(mut self, button: Arc<dyn ButtonSource>) -> Self {
        self.button = Some(button);
        self
    }

    pub fn context(&self) -> &Arc<PmContext> {
        self.observer.context()
    }

    /// Idle controller fed by the button, also usable directly.
    pub fn idle(&self) -> &Arc<IdleController> {
        &self.idle
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    pub fn phase(&self) -> ScenarioPhase {
        ScenarioPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Runs `cycles` light/deep sleep pairs on the calling thread only.
    pub fn run_singlethread(&self, use_logging: bool, cycles: u32) -> PmResult<CycleReport> {
        info!("PM single-thread test, {cycles} cycles");
        self.begin();

        for cycle in 0..cycles {
            debug!("Cycle {}/{cycles}", cycle + 1);
            self.light_sleep(use_logging);
            self.deep_sleep(use_logging);
        }

        self.set_phase(ScenarioPhase::Stopped);
        Ok(self.validator.check(cycles))
    }

    /// Runs `cycles` light/deep sleep pairs with the worker tasks active in
    /// between.
    pub fn run_multithread(&self, use_logging: bool, cycles: u32) -> PmResult<CycleReport> {
        info!("PM multi-thread test, {cycles} cycles");
        let mut pool = WorkerPool::new(&self.config.workers);
        pool.start();
        self.begin();

        for cycle in 0..cycles {
            debug!("Cycle {}/{cycles}", cycle + 1);
            self.suspend(&mut pool);
            self.light_sleep(use_logging);
            self.resume(&mut pool);

            self.suspend(&mut pool);
            self.deep_sleep(use_logging);
            self.resume(&mut pool);
        }

        pool.stop_all();
        self.set_phase(ScenarioPhase::Stopped);
        Ok(self.validator.check(cycles))
    }

    /// Runs `cycles` deep-idle bouts, each started by an idle request.
    ///
    /// With the default configuration this blocks until the requests arrive.
    /// When a finite idle timeout elapses first, the run ends with
    /// [`PmError::Incomplete`].
    pub fn run_multithread_async(&self, use_logging: bool, cycles: u32) -> PmResult<CycleReport> {
        info!("PM async multi-thread test, {cycles} cycles");
        self.bind_button();

        let mut pool = WorkerPool::new(&self.config.workers);
        pool.start();
        self.begin();

        if self.config.kickoff_request {
            self.idle.request_idle(self.config.idle_entry_delay);
        }

        for completed in 0..cycles {
            self.set_phase(ScenarioPhase::AwaitingIdleRequest);
            let delay = match self.idle.wait_for_request(self.config.idle_timeout) {
                Ok(delay) => delay,
                Err(err) => {
                    error!("{err}, stopping after {completed} of {cycles} bouts");
                    pool.stop_all();
                    self.set_phase(ScenarioPhase::Stopped);
                    self.validator
                        .check_states(completed, &[SleepState::DeepSleep]);
                    return Err(PmError::Incomplete {
                        completed,
                        requested: cycles,
                    });
                }
            };
            self.deep_idle_bout(&mut pool, use_logging, delay);
        }

        pool.stop_all();
        self.set_phase(ScenarioPhase::Stopped);
        Ok(self.validator.check_states(cycles, &[SleepState::DeepSleep]))
    }

    fn begin(&self) {
        self.context().reset_counters();
        self.context().enable_checks();
        self.set_phase(ScenarioPhase::ActiveWithTasks);
    }

    fn bind_button(&self) {
        let Some(button) = &self.button else {
            warn!("No button source, idle requests must come from callers");
            return;
        };
        let handler = IdleButtonHandler::new(Arc::clone(&self.idle), self.config.idle_entry_delay)
            .with_press_requests_idle(self.config.press_requests_idle);
        if let Err(err) = button.configure(Arc::new(handler)) {
            error!("Error configuring button: {err}");
        }
    }

    fn deep_idle_bout(&self, pool: &mut WorkerPool, use_logging: bool, delay: Duration) {
        if !delay.is_zero() {
            debug!("Deep idle in {delay:?}");
            self.platform.delay(delay);
        }

        self.suspend(pool);
        self.idle.enter_idle();

        let mut duration =
            self.platform.min_residency(SleepState::DeepSleep) + self.config.deep_margin;
        if let Some(max) = self.config.max_idle_residency {
            duration = duration.min(max);
        }

        let mut attempts = 0u32;
        loop {
            debug!("About to enter deep sleep");
            self.measured_sleep(use_logging, duration, "Wake from Deep Sleep");
            attempts += 1;

            if !self.idle.is_idle() {
                break;
            }
            if let Some(max) = self.config.max_idle_attempts {
                if attempts >= max {
                    warn!("Deep idle still requested after {attempts} sleeps, leaving");
                    break;
                }
            }
        }

        self.idle.exit_idle();
        self.resume(pool);
    }

    fn light_sleep(&self, use_logging: bool) {
        let duration =
            self.platform.min_residency(SleepState::LightSleep) + self.config.light_margin;
        self.set_phase(ScenarioPhase::EnteringSleep);
        self.sleep_and_wake(use_logging, duration, "Wake from Light Sleep");
    }

    fn deep_sleep(&self, use_logging: bool) {
        let duration =
            self.platform.min_residency(SleepState::DeepSleep) + self.config.deep_margin;
        self.measured_sleep(use_logging, duration, "Wake from Deep Sleep");
    }

    /// Sleep bracketed by the trigger and exit markers.
    fn measured_sleep(&self, use_logging: bool, duration: Duration, wake: &str) {
        self.set_phase(ScenarioPhase::EnteringSleep);
        self.observer.mark_trigger();
        self.sleep_and_wake(use_logging, duration, wake);
        self.observer.mark_exit();
    }

    fn sleep_and_wake(&self, use_logging: bool, duration: Duration, wake: &str) {
        self.set_phase(ScenarioPhase::InSleep);
        self.platform.sleep(duration);
        self.platform.busy_wait(self.config.busy_wait);
        self.set_phase(ScenarioPhase::ExitedSleep);
        self.announce(use_logging, wake);
    }

    fn suspend(&self, pool: &mut WorkerPool) {
        pool.suspend_all();
        self.set_phase(ScenarioPhase::TasksSuspended);
    }

    fn resume(&self, pool: &mut WorkerPool) {
        pool.resume_all();
        self.set_phase(ScenarioPhase::ActiveWithTasks);
    }

    fn announce(&self, use_logging: bool, line: &str) {
        if use_logging {
            info!("{line}");
        } else {
            self.platform.console(line);
        }
    }

    fn set_phase(&self, phase: ScenarioPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}
