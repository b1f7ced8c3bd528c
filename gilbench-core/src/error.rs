//! Error types shared by every runner.

use std::any::Any;
use thiserror::Error;

/// Failure of a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError {
    /// Parameters rejected before execution
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Sum of squares no longer fits in u128
    #[error("sum of squares overflowed at i = {0}")]
    Overflow(u64),

    /// The workload panicked; the payload message is preserved
    #[error("panicked: {0}")]
    Panicked(String),

    /// Failure reported from outside this process (e.g. a worker process)
    #[error("{0}")]
    Remote(String),
}

/// Failure of a whole runner invocation.
///
/// Runners are fail-fast: the first failing unit aborts the batch and any
/// outputs already produced are discarded.
#[derive(Debug, Error)]
pub enum RunError {
    /// Bad workload parameters or pool size
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The unit of work at `index` failed
    #[error("workload {index} failed: {cause}")]
    WorkloadFailed {
        /// Submission index of the failing unit
        index: usize,
        /// Underlying failure
        #[source]
        cause: WorkloadError,
    },

    /// Thread pool, runtime or worker processes could not be provisioned
    #[error("worker pool could not be provisioned: {0}")]
    PoolExhausted(String),
}

impl RunError {
    /// Wrap a unit failure with its submission index
    pub fn at(index: usize, cause: WorkloadError) -> Self {
        RunError::WorkloadFailed { index, cause }
    }
}

/// Extract a readable message from a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
