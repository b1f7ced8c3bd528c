#![warn(missing_docs)]
//! gilbench Core - Workloads and Runners
//!
//! This crate provides everything that executes work:
//! - CPU-bound and I/O-bound workloads described by a serializable [`Task`]
//! - Wall-clock timing of a single runner invocation
//! - Sequential, thread-pool and coroutine runners behind one [`Runner`] trait
//! - The worker-process loop used by the process pool
//! - Racy and lock-guarded shared counters for the race-condition demo

mod counter;
mod error;
mod measure;
mod runner;
mod worker;
pub mod workload;

pub use counter::{Counter, LockedCounter, RaceOutcome, RacyCounter, race};
pub use error::{RunError, WorkloadError, panic_message};
pub use gilbench_ipc::{Task, TaskOutput};
pub use measure::{Timer, TimingSample, measure};
pub use runner::{
    CoroutineRunner, Runner, SequentialRunner, Strategy, ThreadPoolRunner, execute_async,
    run_cooperative, run_sequential, run_threaded,
};
pub use worker::{WorkerMain, shutdown_requested};

/// Number of logical CPUs available to this process (at least 1)
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
