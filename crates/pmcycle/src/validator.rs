//! End-of-run consistency checks.
//!
//! Inconsistencies are warnings, never errors: the report lists them and the
//! caller decides what to do. Every check leaves the context ready for the
//! next run, with counters zeroed and the hooks disabled.

use log::{info, warn};

use crate::context::{LatencyStats, PmContext};
use crate::state::{PowerCounter, SleepState};
use crate::sync::Arc;

/// Counter snapshot of one sleep state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StateReport {
    pub state: SleepState,
    pub counter: PowerCounter,
    /// Whether the scenario was expected to exercise this state.
    pub exercised: bool,
}

/// An inconsistency found by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Mismatch {
    /// Entries and exits disagree.
    EntryExit {
        state: SleepState,
        entry: u32,
        exit: u32,
    },
    /// Entries disagree with the number of cycles run.
    Expected {
        state: SleepState,
        expected: u32,
        actual: u32,
    },
}

/// Outcome of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CycleReport {
    pub expected_cycles: u32,
    pub states: Vec<StateReport>,
    pub mismatches: Vec<Mismatch>,
    pub latency: LatencyStats,
}

impl CycleReport {
    /// No counter mismatch was found.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Counter snapshot taken for `state`, if it was checked.
    pub fn counter(&self, state: SleepState) -> Option<PowerCounter> {
        self.states
            .iter()
            .find(|report| report.state == state)
            .map(|report| report.counter)
    }
}

/// Compares the transition counters against the expected cycle count.
pub struct CycleValidator {
    ctx: Arc<PmContext>,
}

impl CycleValidator {
    pub fn new(ctx: Arc<PmContext>) -> Self {
        Self { ctx }
    }

    /// Checks every sleep state.
    pub fn check(&self, expected_cycles: u32) -> CycleReport {
        self.check_states(expected_cycles, &SleepState::ALL)
    }

    /// Checks the `exercised` states; the other states are only reported.
    pub fn check_states(&self, expected_cycles: u32, exercised: &[SleepState]) -> CycleReport {
        let mut states = Vec::with_capacity(SleepState::COUNT);
        let mut mismatches = Vec::new();

        for state in SleepState::ALL {
            let counter = self.ctx.counter(state);
            let checked = exercised.contains(&state);
            info!(
                "PM state {state} entry counter {}",
                counter.entry_count
            );
            info!("PM state {state} exit counter {}", counter.exit_count);

            if checked {
                if !counter.is_balanced() {
                    warn!("PM state {state} entry counter differs from exit counter");
                    mismatches.push(Mismatch::EntryExit {
                        state,
                        entry: counter.entry_count,
                        exit: counter.exit_count,
                    });
                }
                if counter.entry_count != expected_cycles {
                    warn!(
                        "PM state {state} entered {} times, expected {expected_cycles}",
                        counter.entry_count
                    );
                    mismatches.push(Mismatch::Expected {
                        state,
                        expected: expected_cycles,
                        actual: counter.entry_count,
                    });
                }
            }

            states.push(StateReport {
                state,
                counter,
                exercised: checked,
            });
        }

        let latency = self.ctx.latency_stats();
        self.ctx.reset_counters();
        self.ctx.disable_checks();

        CycleReport {
            expected_cycles,
            states,
            mismatches,
            latency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> (CycleValidator, Arc<PmContext>) {
        let ctx = Arc::new(PmContext::new());
        (CycleValidator::new(Arc::clone(&ctx)), ctx)
    }

    fn cycle(ctx: &PmContext, state: SleepState, times: u32) {
        for _ in 0..times {
            ctx.record_entry(state);
            ctx.record_exit(state);
        }
    }

    #[test]
    fn balanced_run_is_consistent_and_resets() {
        let (validator, ctx) = validator();
        ctx.enable_checks();
        cycle(&ctx, SleepState::LightSleep, 3);
        cycle(&ctx, SleepState::DeepSleep, 3);

        let report = validator.check(3);

        assert!(report.is_consistent());
        assert_eq!(
            report.counter(SleepState::DeepSleep),
            Some(PowerCounter::new(3, 3))
        );
        assert!(!ctx.checks_enabled());
        assert!(ctx.counter(SleepState::LightSleep).is_zero());
        assert!(ctx.counter(SleepState::DeepSleep).is_zero());
    }

    #[test]
    fn missing_exit_is_reported() {
        let (validator, ctx) = validator();
        cycle(&ctx, SleepState::LightSleep, 2);
        cycle(&ctx, SleepState::DeepSleep, 1);
        ctx.record_entry(SleepState::DeepSleep);

        let report = validator.check(2);

        assert_eq!(
            report.mismatches,
            vec![Mismatch::EntryExit {
                state: SleepState::DeepSleep,
                entry: 2,
                exit: 1,
            }]
        );
    }

    #[test]
    fn short_run_is_reported_per_state() {
        let (validator, ctx) = validator();
        cycle(&ctx, SleepState::LightSleep, 1);
        cycle(&ctx, SleepState::DeepSleep, 2);

        let report = validator.check(2);

        assert_eq!(
            report.mismatches,
            vec![Mismatch::Expected {
                state: SleepState::LightSleep,
                expected: 2,
                actual: 1,
            }]
        );
    }

    #[test]
    fn unexercised_states_are_reported_but_not_checked() {
        let (validator, ctx) = validator();
        cycle(&ctx, SleepState::DeepSleep, 2);

        let report = validator.check_states(2, &[SleepState::DeepSleep]);

        assert!(report.is_consistent());
        let light = report
            .states
            .iter()
            .find(|r| r.state == SleepState::LightSleep)
            .copied();
        assert_eq!(light.map(|r| r.exercised), Some(false));
    }
}
