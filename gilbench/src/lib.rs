#![warn(missing_docs)]
//! # gilbench
//!
//! Benchmark harness comparing how the same batch of work behaves under
//! different execution strategies:
//! - **Sequential**: one task after another, the baseline for every speedup
//! - **Threads**: a fixed pool of OS threads sharing memory
//! - **Processes**: worker processes, tasks and outputs copied over pipes
//!   using rkyv frames
//! - **Coroutines**: a single-threaded async runtime with a concurrency limit
//!
//! Alongside the timing scenarios, a shared-counter race shows increments
//! lost by an unsynchronized read-modify-write and the locked counter that
//! never loses any.
//!
//! ## Quick Start
//!
//! ```ignore
//! use gilbench::{Runner, ThreadPoolRunner, workload};
//!
//! let tasks = vec![workload::cpu(1_000_000)?; 4];
//! let outputs = ThreadPoolRunner::new(4).run(&tasks)?;
//! ```

// Re-export core types
pub use gilbench_core::{
    Counter, CoroutineRunner, LockedCounter, RaceOutcome, RacyCounter, RunError, Runner,
    SequentialRunner, Strategy, Task, TaskOutput, ThreadPoolRunner, Timer, TimingSample,
    WorkloadError, available_cores, execute_async, measure, race, run_cooperative, run_sequential,
    run_threaded, workload,
};

// Re-export report types
pub use gilbench_report::{
    OutputFormat, RaceEntry, RaceReport, Report, ReportMeta, ReportSummary, RunStatus,
    ScenarioReport, Speedup, StrategyEntry, generate_json_report,
};

// Re-export the process pool and CLI entry points
pub use gilbench_cli::{
    Cli, GilConfig, ProcessPoolRunner, SupervisorError, WorkerHandle, run, run_with_cli,
};

/// IPC protocol types, for tools driving workers directly
pub mod ipc {
    pub use gilbench_ipc::*;
}
