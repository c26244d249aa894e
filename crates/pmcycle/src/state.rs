//! Sleep states tracked by the engine.

use core::fmt;

/// Low-power states whose transitions are counted and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SleepState {
    /// Shallow state, fast wake-up, main clock kept running.
    LightSleep,
    /// Deep state, slow wake-up, main clock stopped.
    DeepSleep,
}

impl SleepState {
    /// Number of supported sleep states.
    pub const COUNT: usize = 2;

    /// Every supported sleep state, shallowest first.
    pub const ALL: [SleepState; Self::COUNT] = [Self::LightSleep, Self::DeepSleep];

    /// Slot of this state in per-state tables.
    pub const fn index(self) -> usize {
        match self {
            Self::LightSleep => 0,
            Self::DeepSleep => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::LightSleep => "light sleep",
            Self::DeepSleep => "deep sleep",
        }
    }
}

impl fmt::Display for SleepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State identifier announced by the platform power subsystem.
///
/// Platforms expose more states than the engine validates. Only the first
/// substate of each sleep family is tracked, everything else is ignored by the
/// transition hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformState {
    Active,
    /// `Sleep(n)`: n-th light sleep substate, 1-based.
    Sleep(u8),
    /// `DeepSleep(n)`: n-th deep sleep substate, 1-based.
    DeepSleep(u8),
    SoftOff,
}

impl PlatformState {
    /// Maps the platform identifier to a tracked sleep state.
    pub const fn sleep_state(self) -> Option<SleepState> {
        match self {
            Self::Sleep(1) => Some(SleepState::LightSleep),
            Self::DeepSleep(1) => Some(SleepState::DeepSleep),
            _ => None,
        }
    }
}

impl From<SleepState> for PlatformState {
    fn from(state: SleepState) -> Self {
        match state {
            SleepState::LightSleep => Self::Sleep(1),
            SleepState::DeepSleep => Self::DeepSleep(1),
        }
    }
}

/// Entry and exit counts for one sleep state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PowerCounter {
    pub entry_count: u32,
    pub exit_count: u32,
}

impl PowerCounter {
    pub const fn new(entry_count: u32, exit_count: u32) -> Self {
        Self {
            entry_count,
            exit_count,
        }
    }

    /// True when every entry was matched by an exit.
    pub const fn is_balanced(&self) -> bool {
        self.entry_count == self.exit_count
    }

    pub const fn is_zero(&self) -> bool {
        self.entry_count == 0 && self.exit_count == 0
    }
}
