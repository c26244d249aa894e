//! Transition hooks invoked by the platform power subsystem.
//!
//! The platform calls [`PowerNotifier::on_state_enter`] right before it drops
//! into a low-power state and [`PowerNotifier::on_state_exit`] right after it
//! comes back. [`TransitionObserver`] counts those calls and measures how long
//! deep-sleep entry took since the driver marked its trigger.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

use log::{debug, info, trace, warn};

use crate::context::PmContext;
use crate::platform::Clock;
use crate::state::{PlatformState, SleepState};
use crate::sync::Arc;

/// Default upper bound for deep-sleep entry latency.
pub const DEFAULT_LATENCY_THRESHOLD: Duration = Duration::from_millis(500);

const MSEC_PER_SEC: u64 = 1000;

/// Receiver of power state transition announcements.
///
/// Implementations run in whatever context the platform uses to deliver the
/// notification and must not block.
pub trait PowerNotifier: Send + Sync {
    fn on_state_enter(&self, state: PlatformState);
    fn on_state_exit(&self, state: PlatformState);
}

/// Outcome of a deep-sleep entry latency measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyVerdict {
    /// Within the configured threshold.
    Nominal,
    /// Above the threshold but under one second.
    Elevated,
    /// One second or more.
    TooHigh,
    /// No trigger was marked before the entry.
    Unmeasured,
}

impl LatencyVerdict {
    /// Classifies `latency_ms` against `threshold_ms`.
    pub const fn classify(latency_ms: u64, threshold_ms: u64) -> Self {
        if latency_ms / MSEC_PER_SEC > 0 {
            Self::TooHigh
        } else if latency_ms % MSEC_PER_SEC > threshold_ms {
            Self::Elevated
        } else {
            Self::Nominal
        }
    }
}

/// Counts sleep transitions and checks deep-sleep entry latency.
pub struct TransitionObserver {
    ctx: Arc<PmContext>,
    clock: Arc<dyn Clock>,
    threshold_ms: AtomicU64,
}

impl TransitionObserver {
    pub fn new(ctx: Arc<PmContext>, clock: Arc<dyn Clock>) -> Self {
        Self {
            ctx,
            clock,
            threshold_ms: AtomicU64::new(DEFAULT_LATENCY_THRESHOLD.as_millis() as u64),
        }
    }

    /// Sets the latency above which a deep-sleep entry is reported.
    pub fn with_latency_threshold(self, threshold: Duration) -> Self {
        self.set_latency_threshold(threshold);
        self
    }

    /// Changes the latency threshold of an observer that is already shared.
    pub fn set_latency_threshold(&self, threshold: Duration) {
        self.threshold_ms
            .store(threshold.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn context(&self) -> &Arc<PmContext> {
        &self.ctx
    }

    pub fn latency_threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms.load(Ordering::Relaxed))
    }

    /// Marks the instant a measured sleep transition is requested.
    ///
    /// There is a single trigger slot: marking again before the matching
    /// deep-sleep entry overwrites the earlier mark.
    pub fn mark_trigger(&self) {
        self.ctx.store_trigger(self.clock.uptime_ms());
        trace!("PM >");
    }

    /// Marks the return to the driver after a measured sleep.
    ///
    /// Consumes the trigger slot and reports the time since it was last set,
    /// which after a deep-sleep entry is the residency in that state.
    pub fn mark_exit(&self) -> Option<Duration> {
        trace!("PM <");
        let since = self.ctx.take_trigger()?;
        let residency = self.clock.uptime_ms().saturating_sub(since);
        info!(
            "PM sleep residency {}.{:03} seconds",
            residency / MSEC_PER_SEC,
            residency % MSEC_PER_SEC
        );
        Some(Duration::from_millis(residency))
    }

    fn check_latency(&self) -> LatencyVerdict {
        let now = self.clock.uptime_ms();
        let Some(trigger) = self.ctx.swap_trigger(now) else {
            debug!("Deep sleep entered without a trigger mark");
            return LatencyVerdict::Unmeasured;
        };

        let latency = now.saturating_sub(trigger);
        info!(
            "PM sleep entry latency {}.{:03} seconds",
            latency / MSEC_PER_SEC,
            latency % MSEC_PER_SEC
        );

        let threshold = self.threshold_ms.load(Ordering::Relaxed);
        let verdict = LatencyVerdict::classify(latency, threshold);
        match verdict {
            LatencyVerdict::TooHigh => warn!("Sleep entry latency is too high"),
            LatencyVerdict::Elevated => warn!("Sleep entry latency is higher than expected"),
            LatencyVerdict::Nominal | LatencyVerdict::Unmeasured => {}
        }
        self.ctx.record_latency(verdict, latency);
        verdict
    }
}

impl PowerNotifier for TransitionObserver {
    fn on_state_enter(&self, state: PlatformState) {
        if !self.ctx.checks_enabled() {
            return;
        }

        match state.sleep_state() {
            Some(SleepState::LightSleep) => {
                trace!("LT enter");
                self.ctx.record_entry(SleepState::LightSleep);
            }
            Some(SleepState::DeepSleep) => {
                trace!("DP enter");
                self.ctx.record_entry(SleepState::DeepSleep);
                self.check_latency();
            }
            None => {}
        }
    }

    fn on_state_exit(&self, state: PlatformState) {
        if !self.ctx.checks_enabled() {
            return;
        }

        if let Some(sleep) = state.sleep_state() {
            trace!("{sleep} exit");
            self.ctx.record_exit(sleep);
        }
    }
}
