//! Error type shared by the engine.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the sleep-cycle engine.
///
/// Consistency problems (counter mismatches, high latency) are not errors:
/// they are logged as warnings and collected in the
/// [`CycleReport`](crate::CycleReport).
#[derive(Error, Debug)]
pub enum PmError {
    #[error("failed to spawn worker task {name}")]
    WorkerSpawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("button binding failed: {0}")]
    ButtonBinding(String),
    #[error("no idle request within {0:?}")]
    IdleTimeout(Duration),
    #[error("scenario completed {completed} of {requested} cycles")]
    Incomplete { completed: u32, requested: u32 },
}

pub type PmResult<T> = Result<T, PmError>;
