//! # pmcycle
//!
//! Sleep-cycle orchestration and validation for embedded power management.
//! The engine drives a platform through repeated light-sleep and deep-sleep
//! transitions under load and checks, once the run is over, that every entry
//! was matched by an exit and that deep-sleep entry latency stayed bounded.
//!
//! ## Module Overview
//! - [`state`]     – Sleep states and the platform identifiers they map from.
//! - [`context`]   – Shared counters, trigger timestamp and run flags.
//! - [`observer`]  – Entry/exit hooks called by the platform power subsystem.
//! - [`idle`]      – Capacity-one idle request gate and deep-idle flag.
//! - [`button`]    – Level-change capability fed by an external button.
//! - [`worker`]    – Periodic background tasks suspended around sleep.
//! - [`validator`] – End-of-run counter checks.
//! - [`scenario`]  – Single-threaded, multi-threaded and asynchronous drivers.
//! - [`platform`]  – What the engine needs from the platform.
//!
//! Hosts wire a [`Platform`] implementation to a [`TransitionObserver`] and
//! hand both to [`SleepCycleTest`].

pub mod button;
pub mod config;
pub mod context;
pub mod error;
pub mod idle;
pub mod observer;
pub mod platform;
pub mod scenario;
pub mod state;
mod sync;
pub mod validator;
pub mod worker;

pub use button::{ButtonSource, IdleButtonHandler, LevelChangeHandler};
pub use config::{ScenarioConfig, ScenarioConfigBuilder};
pub use context::{LatencyStats, PmContext};
pub use error::{PmError, PmResult};
pub use idle::{IdleController, Timeout};
pub use observer::{LatencyVerdict, PowerNotifier, TransitionObserver};
pub use platform::{Clock, Platform};
pub use scenario::{ScenarioPhase, SleepCycleTest};
pub use state::{PlatformState, PowerCounter, SleepState};
pub use validator::{CycleReport, CycleValidator, Mismatch, StateReport};
pub use worker::{TaskId, TaskState, WorkerPool, WorkerSpec};

#[cfg(test)]
mod tests;
