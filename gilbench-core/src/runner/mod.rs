//! Runners
//!
//! Interchangeable strategies for executing a batch of K tasks. Every runner
//! has the same contract:
//!
//! - exactly K outputs, in submission order, on success
//! - `InvalidArgument` before anything runs if a task or the pool size is bad
//! - fail-fast: a failing unit stops everything submitted after it, partial
//!   outputs are dropped, nothing is retried; the lowest failing index is
//!   reported whatever order the units finished in
//! - whatever pool the runner provisions is torn down before `run` returns,
//!   on every path
//!
//! ```text
//!             idle ──run()──▶ running ──┬──▶ completed (Vec<TaskOutput>)
//!                                       └──▶ failed    (RunError)
//! ```
//!
//! The process-pool runner lives in the CLI crate next to its supervisor.

mod coroutine;
mod sequential;
mod thread_pool;

pub use coroutine::{CoroutineRunner, execute_async, run_cooperative};
pub use sequential::{SequentialRunner, run_sequential};
pub use thread_pool::{ThreadPoolRunner, run_threaded};

use crate::error::{RunError, WorkloadError, panic_message};
use crate::measure::{TimingSample, measure};
use gilbench_ipc::{Task, TaskOutput};
use std::fmt;

/// Execution strategy, used to label runners in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// One after another on the calling thread
    Sequential,
    /// Fixed pool of OS threads sharing memory
    Threads(usize),
    /// Fixed pool of OS processes, values copied across the boundary
    Processes(usize),
    /// Cooperative tasks on one thread, at most N in flight
    Coroutines(usize),
}

impl Strategy {
    /// Pool size (1 for sequential)
    pub fn workers(&self) -> usize {
        match *self {
            Strategy::Sequential => 1,
            Strategy::Threads(n) | Strategy::Processes(n) | Strategy::Coroutines(n) => n,
        }
    }

    /// Short machine-friendly name
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::Threads(_) => "threads",
            Strategy::Processes(_) => "processes",
            Strategy::Coroutines(_) => "coroutines",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Sequential => write!(f, "sequential"),
            Strategy::Threads(n) => write!(f, "{n} thread(s)"),
            Strategy::Processes(n) => write!(f, "{n} process(es)"),
            Strategy::Coroutines(n) => write!(f, "coroutines (limit {n})"),
        }
    }
}

/// A strategy for executing a batch of tasks
pub trait Runner {
    /// Which strategy this runner implements
    fn strategy(&self) -> Strategy;

    /// Execute every task and return the outputs in submission order
    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError>;

    /// [`Runner::run`], timed from just before the call to just after it
    /// returns. Failed runs are timed too.
    fn run_timed(&self, tasks: &[Task]) -> (Result<Vec<TaskOutput>, RunError>, TimingSample) {
        measure(|| self.run(tasks))
    }
}

impl<R: Runner + ?Sized> Runner for Box<R> {
    fn strategy(&self) -> Strategy {
        (**self).strategy()
    }

    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError> {
        (**self).run(tasks)
    }
}

/// Reject a zero-sized pool
pub(crate) fn check_workers(workers: usize) -> Result<(), RunError> {
    if workers == 0 {
        return Err(RunError::InvalidArgument(
            "worker count must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Run one unit, converting a panic into a [`WorkloadError`]
pub(crate) fn guarded<O, F>(f: F) -> Result<O, WorkloadError>
where
    F: FnOnce() -> Result<O, WorkloadError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic) => Err(WorkloadError::Panicked(panic_message(panic.as_ref()))),
    }
}
