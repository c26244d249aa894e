//! Run-wide power bookkeeping shared by the observer, the idle controller, the
//! validator and the drivers.
//!
//! Every field is an atomic. The transition hooks write here from whatever
//! context the platform announces transitions in, so nothing in this module may
//! block or take a lock.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::observer::LatencyVerdict;
use crate::state::{PowerCounter, SleepState};

/// Sentinel for "no timestamp recorded".
const UNSET: u64 = u64::MAX;

#[derive(Default)]
struct CounterCell {
    entry: AtomicU32,
    exit: AtomicU32,
}

impl CounterCell {
    fn snapshot(&self) -> PowerCounter {
        PowerCounter::new(
            self.entry.load(Ordering::Relaxed),
            self.exit.load(Ordering::Relaxed),
        )
    }

    fn clear(&self) {
        self.entry.store(0, Ordering::Relaxed);
        self.exit.store(0, Ordering::Relaxed);
    }
}

struct LatencyCell {
    elevated: AtomicU32,
    too_high: AtomicU32,
    last_ms: AtomicU64,
}

impl LatencyCell {
    const fn new() -> Self {
        Self {
            elevated: AtomicU32::new(0),
            too_high: AtomicU32::new(0),
            last_ms: AtomicU64::new(UNSET),
        }
    }

    fn clear(&self) {
        self.elevated.store(0, Ordering::Relaxed);
        self.too_high.store(0, Ordering::Relaxed);
        self.last_ms.store(UNSET, Ordering::Relaxed);
    }
}

/// Deep-sleep entry latency verdicts collected during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LatencyStats {
    /// Entries slower than the threshold but under one second.
    pub elevated: u32,
    /// Entries that took a second or more.
    pub too_high: u32,
    /// Latency of the most recent measured entry.
    pub last_ms: Option<u64>,
}

/// Shared state of one sleep-cycle test bench.
pub struct PmContext {
    counters: [CounterCell; SleepState::COUNT],
    trigger_ms: AtomicU64,
    checks_enabled: AtomicBool,
    deep_idle: AtomicBool,
    latency: LatencyCell,
}

impl PmContext {
    /// Creates a context with zeroed counters and checks disabled.
    pub fn new() -> Self {
        Self {
            counters: Default::default(),
            trigger_ms: AtomicU64::new(UNSET),
            checks_enabled: AtomicBool::new(false),
            deep_idle: AtomicBool::new(false),
            latency: LatencyCell::new(),
        }
    }

    pub fn enable_checks(&self) {
        self.checks_enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable_checks(&self) {
        self.checks_enabled.store(false, Ordering::SeqCst);
    }

    /// Whether the transition hooks currently count anything.
    pub fn checks_enabled(&self) -> bool {
        self.checks_enabled.load(Ordering::SeqCst)
    }

    /// Current entry/exit counts for `state`.
    pub fn counter(&self, state: SleepState) -> PowerCounter {
        self.counters[state.index()].snapshot()
    }

    /// Zeroes every counter and the latency statistics.
    pub fn reset_counters(&self) {
        for cell in &self.counters {
            cell.clear();
        }
        self.latency.clear();
    }

    pub fn set_deep_idle(&self, idle: bool) {
        self.deep_idle.store(idle, Ordering::SeqCst);
    }

    pub fn is_deep_idle(&self) -> bool {
        self.deep_idle.load(Ordering::SeqCst)
    }

    /// Clears the deep-idle flag, returning whether it was set.
    pub(crate) fn take_deep_idle(&self) -> bool {
        self.deep_idle.swap(false, Ordering::SeqCst)
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let last = self.latency.last_ms.load(Ordering::Relaxed);
        LatencyStats {
            elevated: self.latency.elevated.load(Ordering::Relaxed),
            too_high: self.latency.too_high.load(Ordering::Relaxed),
            last_ms: (last != UNSET).then_some(last),
        }
    }

    /// Outstanding trigger timestamp, if any.
    pub fn trigger_ms(&self) -> Option<u64> {
        let value = self.trigger_ms.load(Ordering::SeqCst);
        (value != UNSET).then_some(value)
    }

    pub(crate) fn record_entry(&self, state: SleepState) {
        self.counters[state.index()]
            .entry
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exit(&self, state: SleepState) {
        self.counters[state.index()]
            .exit
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Overwrites the trigger slot. A previous unconsumed mark is lost.
    pub(crate) fn store_trigger(&self, now_ms: u64) {
        self.trigger_ms.store(now_ms, Ordering::SeqCst);
    }

    /// Re-marks the trigger slot with `now_ms`, returning the previous mark.
    pub(crate) fn swap_trigger(&self, now_ms: u64) -> Option<u64> {
        let previous = self.trigger_ms.swap(now_ms, Ordering::SeqCst);
        (previous != UNSET).then_some(previous)
    }

    /// Consumes the trigger slot.
    pub(crate) fn take_trigger(&self) -> Option<u64> {
        let previous = self.trigger_ms.swap(UNSET, Ordering::SeqCst);
        (previous != UNSET).then_some(previous)
    }

    pub(crate) fn record_latency(&self, verdict: LatencyVerdict, latency_ms: u64) {
        match verdict {
            LatencyVerdict::Elevated => {
                self.latency.elevated.fetch_add(1, Ordering::Relaxed);
            }
            LatencyVerdict::TooHigh => {
                self.latency.too_high.fetch_add(1, Ordering::Relaxed);
            }
            LatencyVerdict::Nominal | LatencyVerdict::Unmeasured => {}
        }
        if verdict != LatencyVerdict::Unmeasured {
            self.latency.last_ms.store(latency_ms, Ordering::Relaxed);
        }
    }
}

impl Default for PmContext {
    fn default() -> Self {
        Self::new()
    }
}
