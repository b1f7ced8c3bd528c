//! IPC Message Types
//!
//! A worker process only ever receives a [`Task`] and only ever sends back a
//! [`TaskOutput`] or a failure description, so these scalar types define
//! exactly what can cross the process boundary.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// A single unit of work, described by value.
///
/// Parameters are signed so that negative input can reach validation and be
/// rejected instead of being silently clamped by an unsigned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum Task {
    /// CPU-bound: sum of `i * i` for `i` in `0..n`
    SumOfSquares {
        /// Upper bound (exclusive)
        n: i64,
    },
    /// I/O-bound: block the executing unit for `nanos` without spinning
    Sleep {
        /// Wait duration in nanoseconds
        nanos: i64,
    },
    /// CPU-bound sum followed by an I/O wait
    Mixed {
        /// Upper bound of the CPU part
        n: i64,
        /// Wait duration in nanoseconds
        nanos: i64,
    },
}

impl Task {
    /// Validate parameters, returning a description of the first error found.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Task::SumOfSquares { n } => check_n(n),
            Task::Sleep { nanos } => check_nanos(nanos),
            Task::Mixed { n, nanos } => {
                check_n(n)?;
                check_nanos(nanos)
            }
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Task::SumOfSquares { .. } => "cpu",
            Task::Sleep { .. } => "io",
            Task::Mixed { .. } => "mixed",
        }
    }
}

fn check_n(n: i64) -> Result<(), String> {
    if n < 0 {
        return Err(format!("n must be >= 0, got {n}"));
    }
    Ok(())
}

fn check_nanos(nanos: i64) -> Result<(), String> {
    if nanos < 0 {
        return Err(format!("wait duration must be >= 0, got {nanos}ns"));
    }
    Ok(())
}

/// Value produced by a [`Task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum TaskOutput {
    /// Result of the CPU-bound part (u128: the sum outgrows u64 past n ≈ 3.8M)
    Sum(u128),
    /// Pure waits produce nothing
    Unit,
}

/// Categories of task failures reported by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// Task returned an error
    Error,
    /// Task panicked (caught)
    Panic,
    /// Task parameters failed validation on the worker side
    InvalidArgument,
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// OS process id of the worker
    pub pid: u32,
    /// Number of logical CPUs visible to the worker
    pub cpu_count: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            cpu_count: num_cpus(),
        }
    }
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),

    /// Task at `index` completed
    Output {
        /// Submission index echoed from the command
        index: u64,
        /// Produced value
        output: TaskOutput,
    },

    /// Task at `index` failed
    Failure {
        /// Submission index echoed from the command
        index: u64,
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Execute one task
    Run {
        /// Submission index, echoed back in the reply
        index: u64,
        /// The task, by value
        task: Task,
    },

    /// Exit the worker loop
    Shutdown,
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(1)
}
