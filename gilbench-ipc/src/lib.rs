#![warn(missing_docs)]
//! gilbench IPC Protocol
//!
//! Everything that crosses the supervisor/worker process boundary lives here.
//! Tasks and their outputs are plain scalar data serialized with rkyv and sent
//! as length-prefixed frames; no other state can be passed to a worker.

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE};
pub use messages::{
    FailureKind, SupervisorCommand, Task, TaskOutput, WorkerCapabilities, WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the `<read_fd>,<write_fd>` pair handed to a worker
pub const IPC_FD_ENV: &str = "GILBENCH_IPC_FD";

/// Hidden CLI flag that turns the `gilbench` binary into a pool worker
pub const WORKER_FLAG: &str = "--gil-worker";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_is_small() {
        // Largest variant is two i64 fields plus the discriminant
        assert!(std::mem::size_of::<Task>() <= 24);
    }

    #[test]
    fn test_worker_flag_is_long_option() {
        assert!(WORKER_FLAG.starts_with("--"));
    }
}
