//! Simulated push button with a sampling debouncer.
//!
//! The pin idles high; pressing pulls it to 0. Raw samples only turn into a
//! level change once the new level has been read the configured number of
//! times in a row.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;
use pmcycle::{ButtonSource, IdleController, LevelChangeHandler, PmError, PmResult};

/// Identical consecutive samples needed to accept a new level.
pub const DEFAULT_DEBOUNCE_COUNT: u8 = 5;

/// Level of a released button.
const RELEASED: i32 = 1;
const PRESSED: i32 = 0;

/// Counts consecutive samples of a level that differs from the stable one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: u8,
    stable: i32,
    candidate: i32,
    count: u8,
}

impl Debouncer {
    pub fn new(threshold: u8, initial: i32) -> Self {
        Self {
            threshold: threshold.max(1),
            stable: initial,
            candidate: initial,
            count: 0,
        }
    }

    pub fn stable(&self) -> i32 {
        self.stable
    }

    /// Feeds one raw sample, returning the new level when it becomes stable.
    pub fn sample(&mut self, level: i32) -> Option<i32> {
        if level == self.stable {
            self.count = 0;
            return None;
        }
        if level != self.candidate {
            self.candidate = level;
            self.count = 0;
        }
        self.count += 1;
        if self.count < self.threshold {
            return None;
        }
        self.stable = level;
        self.count = 0;
        Some(level)
    }
}

struct ButtonInner {
    name: &'static str,
    bound: bool,
    debouncer: Mutex<Debouncer>,
    handler: Mutex<Option<Arc<dyn LevelChangeHandler>>>,
}

/// Button device; clones share the same pin.
#[derive(Clone)]
pub struct SimulatedButton {
    inner: Arc<ButtonInner>,
}

impl SimulatedButton {
    pub fn new(name: &'static str) -> Self {
        Self::with_debounce(name, DEFAULT_DEBOUNCE_COUNT)
    }

    pub fn with_debounce(name: &'static str, threshold: u8) -> Self {
        Self::build(name, threshold, true)
    }

    /// A button whose device is not ready; binding it fails.
    pub fn unbound(name: &'static str) -> Self {
        Self::build(name, DEFAULT_DEBOUNCE_COUNT, false)
    }

    fn build(name: &'static str, threshold: u8, bound: bool) -> Self {
        Self {
            inner: Arc::new(ButtonInner {
                name,
                bound,
                debouncer: Mutex::new(Debouncer::new(threshold, RELEASED)),
                handler: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Holds the pin low until the press is accepted.
    pub fn press(&self) {
        self.hold(PRESSED);
    }

    /// Lets the pin go high until the release is accepted.
    pub fn release(&self) {
        self.hold(RELEASED);
    }

    /// Current debounced level.
    pub fn level(&self) -> i32 {
        self.inner.debouncer.lock().stable()
    }

    /// Feeds one raw pin sample.
    pub fn sample(&self, level: i32) {
        let changed = self.inner.debouncer.lock().sample(level);
        if let Some(level) = changed {
            self.deliver(level);
        }
    }

    fn hold(&self, level: i32) {
        let threshold = self.inner.debouncer.lock().threshold;
        for _ in 0..threshold {
            self.sample(level);
        }
    }

    fn deliver(&self, level: i32) {
        let handler = self.inner.handler.lock().clone();
        if let Some(handler) = handler {
            handler.on_level_change(level);
        }
    }
}

impl ButtonSource for SimulatedButton {
    fn configure(&self, handler: Arc<dyn LevelChangeHandler>) -> PmResult<()> {
        if !self.inner.bound {
            return Err(PmError::ButtonBinding(format!(
                "button device {} is not ready",
                self.inner.name
            )));
        }
        *self.inner.handler.lock() = Some(handler);
        info!("Set up button at {}", self.inner.name);
        Ok(())
    }
}

/// Presses `button` `bouts` times, `interval` apart, releasing each press as
/// soon as the deep-idle bout it started is under way.
pub fn spawn_presser(
    button: SimulatedButton,
    idle: Arc<IdleController>,
    bouts: u32,
    interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("pm-{}", button.name()))
        .spawn(move || {
            for _ in 0..bouts {
                thread::sleep(interval);
                button.press();

                let deadline = Instant::now() + interval.max(Duration::from_secs(5));
                while !idle.is_idle() {
                    if Instant::now() >= deadline {
                        warn!("Deep idle did not start after press");
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                button.release();
            }
        })
}
