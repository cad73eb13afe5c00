//! Errors surfaced by the coordinator.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = CoordinatorError> = std::result::Result<T, E>;

/// Everything a scenario run can fail with.
///
/// Every variant reaches the caller of [`run_scenario`](crate::run_scenario);
/// nothing is swallowed or only logged.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A scenario parameter is outside its allowed range.
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    /// The worker pool could not be created in full. The run is aborted.
    #[error("could only spawn {spawned} of {requested} workers: {source}")]
    ResourceExhausted {
        requested: usize,
        spawned: usize,
        #[source]
        source: io::Error,
    },

    /// The completion barrier did not release within the bound.
    #[error("timed out after {waited:?} with {completed}/{expected} jobs complete")]
    Timeout {
        waited: Duration,
        completed: usize,
        expected: usize,
    },

    /// A guarded run finished on a value other than the sum of its deltas.
    #[error("guarded counter finished at {actual}, expected {expected}")]
    InvariantViolation { expected: i64, actual: i64 },

    #[error("worker `{worker}` panicked")]
    WorkerPanicked { worker: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CoordinatorError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
