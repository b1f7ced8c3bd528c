//! Supervisor Process
//!
//! The process-pool runner. Spawns worker processes, hands them tasks by
//! value over pipes and collects their outputs.

use gilbench_core::workload::validate_all;
use gilbench_core::{RunError, Runner, Strategy, WorkloadError};
use gilbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, PROTOCOL_VERSION,
    SupervisorCommand, Task, TaskOutput, WORKER_FLAG, WorkerCapabilities, WorkerMessage,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while driving a worker process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker process or its pipes could not be created
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// A frame could not be encoded, decoded or transferred
    #[error("IPC error: {0}")]
    IpcError(String),

    /// The worker went away; carries how it exited, when known
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// The worker sent a message that does not fit the conversation
    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError {
        /// What the supervisor was waiting for
        expected: String,
        /// What arrived instead
        got: String,
    },

    /// The worker ran the task and reported a failure
    #[error("{message}")]
    TaskFailed {
        /// Category of the failure
        kind: FailureKind,
        /// Failure message from the worker
        message: String,
    },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

impl SupervisorError {
    /// Failure of the task a worker was executing
    pub fn into_workload_error(self) -> WorkloadError {
        match self {
            SupervisorError::TaskFailed {
                kind: FailureKind::Panic,
                message,
            } => WorkloadError::Panicked(message),
            SupervisorError::TaskFailed {
                kind: FailureKind::InvalidArgument,
                message,
            } => WorkloadError::InvalidArgument(message),
            other => WorkloadError::Remote(other.to_string()),
        }
    }
}

/// Failures before any task was handed out mean the pool never existed
impl From<SupervisorError> for RunError {
    fn from(e: SupervisorError) -> Self {
        RunError::PoolExhausted(e.to_string())
    }
}

/// Create a pipe pair, returning (read_fd, write_fd).
///
/// Workers are spawned from several threads at once, so on Linux both ends
/// are created close-on-exec atomically; a sibling's fork must never
/// inherit them.
#[cfg(target_os = "linux")]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok((fds[0], fds[1]))
}

/// Create a pipe pair, returning (read_fd, write_fd).
#[cfg(not(target_os = "linux"))]
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // Close-on-exec on both ends; the child clears it on the two it keeps
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    capabilities: Option<WorkerCapabilities>,
}

impl WorkerHandle {
    /// Spawn a worker from `binary`, using fd 3/4 for IPC, and wait for
    /// its handshake.
    pub fn spawn_binary(binary: &Path) -> Result<Self, SupervisorError> {
        // cmd_pipe: supervisor writes commands → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages from fd 4 → supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // In the child: move both ends above 4 first so neither dup2
        // clobbers the other, then place them on fds 3 and 4. Everything
        // else is close-on-exec.
        unsafe {
            command.pre_exec(move || {
                let read_copy = libc::fcntl(cmd_read, libc::F_DUPFD, 5);
                let write_copy = libc::fcntl(msg_write, libc::F_DUPFD, 5);
                if read_copy < 0 || write_copy < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                if libc::dup2(read_copy, 3) < 0 || libc::dup2(write_copy, 4) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                libc::close(read_copy);
                libc::close(write_copy);
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // Child-side ends are the child's now
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            capabilities: None,
        };

        handle.wait_for_hello()?;
        debug!(pid = handle.child.id(), "worker spawned");
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        let msg: WorkerMessage = match self.reader.read() {
            Ok(msg) => msg,
            Err(FrameError::Closed) => {
                return Err(SupervisorError::WorkerCrashed(format!(
                    "worker exited before handshake ({})",
                    self.exit_description()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                self.capabilities = Some(caps);
                Ok(())
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// What the worker announced in its handshake
    pub fn capabilities(&self) -> Option<&WorkerCapabilities> {
        self.capabilities.as_ref()
    }

    /// OS process id of the worker
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Execute one task on this worker and wait for its reply
    pub fn run_task(&mut self, index: usize, task: Task) -> Result<TaskOutput, SupervisorError> {
        let index = index as u64;
        if let Err(e) = self.writer.write(&SupervisorCommand::Run { index, task }) {
            return Err(self.crashed_or(e));
        }

        let msg: WorkerMessage = match self.reader.read() {
            Ok(msg) => msg,
            Err(e) => return Err(self.crashed_or(e)),
        };

        match msg {
            WorkerMessage::Output { index: got, output } if got == index => Ok(output),
            WorkerMessage::Failure {
                index: got,
                kind,
                message,
            } if got == index => Err(SupervisorError::TaskFailed { kind, message }),
            other => Err(SupervisorError::ProtocolError {
                expected: format!("reply for task {index}"),
                got: format!("{:?}", other),
            }),
        }
    }

    /// A broken channel means the worker is gone; report how it ended
    fn crashed_or(&mut self, e: FrameError) -> SupervisorError {
        match e {
            FrameError::Closed | FrameError::Io(_) => {
                // Give the exit status a moment to become observable
                let _ = self.child.wait();
                SupervisorError::WorkerCrashed(self.exit_description())
            }
            other => other.into(),
        }
    }

    fn exit_description(&mut self) -> String {
        match self.child.try_wait() {
            Ok(Some(status)) => format!("worker exited with {status}"),
            Ok(None) => "worker closed its channel".to_string(),
            Err(e) => format!("worker status unavailable: {e}"),
        }
    }

    /// Shutdown the worker gracefully and reap it
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        self.writer.write(&SupervisorCommand::Shutdown)?;
        let status = self.child.wait()?;
        debug!(pid = self.child.id(), %status, "worker shut down");
        Ok(())
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            // Graceful: SIGTERM first, brief wait, then SIGKILL
            let _ = send_sigterm(self.child.id());
            std::thread::sleep(Duration::from_millis(50));
            if self.is_alive() {
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
    }
}

/// Runner backed by a fixed-size pool of worker processes.
///
/// Every invocation starts its own workers and shuts them down before
/// returning, so process start-up and teardown are part of what a
/// measurement of [`Runner::run`] captures.
#[derive(Debug, Clone)]
pub struct ProcessPoolRunner {
    workers: usize,
    binary: Option<PathBuf>,
}

impl ProcessPoolRunner {
    /// Pool of `workers` processes re-executing the current binary
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            binary: None,
        }
    }

    /// Pool of `workers` processes running `binary` in worker mode
    pub fn with_binary(workers: usize, binary: impl Into<PathBuf>) -> Self {
        Self {
            workers,
            binary: Some(binary.into()),
        }
    }

    fn binary(&self) -> Result<PathBuf, RunError> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|e| {
                RunError::PoolExhausted(format!("cannot locate worker binary: {e}"))
            }),
        }
    }
}

/// Shared state of one batch
struct Batch<'a> {
    tasks: &'a [Task],
    binary: &'a Path,
    next: AtomicUsize,
    stop: AtomicBool,
}

/// How one coordinator thread ended
enum SlotOutcome {
    Done(Vec<(usize, TaskOutput)>),
    SpawnFailed(SupervisorError),
    TaskFailed(usize, WorkloadError),
}

impl Batch<'_> {
    /// Own one worker process and feed it tasks until the queue is empty
    /// or another slot failed.
    fn coordinate(&self) -> SlotOutcome {
        let mut worker = match WorkerHandle::spawn_binary(self.binary) {
            Ok(worker) => worker,
            Err(e) => {
                self.stop.store(true, Ordering::SeqCst);
                return SlotOutcome::SpawnFailed(e);
            }
        };
        if let Some(caps) = worker.capabilities() {
            debug!(pid = caps.pid, cpus = caps.cpu_count, "worker ready");
        }

        let mut outputs = Vec::new();
        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let Some(&task) = self.tasks.get(index) else {
                break;
            };
            debug!(index, kind = task.kind(), "dispatching task");

            match worker.run_task(index, task) {
                Ok(output) => outputs.push((index, output)),
                Err(e) => {
                    self.stop.store(true, Ordering::SeqCst);
                    warn!(index, "task failed in worker process: {e}");
                    // Dropping the handle terminates the worker if it is
                    // still alive
                    return SlotOutcome::TaskFailed(index, e.into_workload_error());
                }
            }
        }

        if let Err(e) = worker.shutdown() {
            warn!("worker did not shut down cleanly: {e}");
        }
        SlotOutcome::Done(outputs)
    }
}

impl Runner for ProcessPoolRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Processes(self.workers)
    }

    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError> {
        if self.workers == 0 {
            return Err(RunError::InvalidArgument(
                "worker count must be >= 1".to_string(),
            ));
        }
        validate_all(tasks)?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let binary = self.binary()?;
        let slots = self.workers.min(tasks.len());
        let batch = Batch {
            tasks,
            binary: &binary,
            next: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        };

        let outcomes: Vec<SlotOutcome> = ThreadPoolBuilder::new()
            .num_threads(slots)
            .thread_name(|i| format!("gilbench-supervisor-{i}"))
            .build_scoped(
                |thread| thread.run(),
                |pool| {
                    pool.install(|| {
                        (0..slots)
                            .into_par_iter()
                            .map(|_| batch.coordinate())
                            .collect::<Vec<_>>()
                    })
                },
            )
            .map_err(|e| {
                RunError::PoolExhausted(format!("failed to build coordinator pool: {e}"))
            })?;
        debug!(workers = slots, units = tasks.len(), "process pool joined");

        collect_outcomes(outcomes, tasks.len())
    }
}

/// Merge per-slot results back into submission order.
///
/// A failed spawn wins over task failures; among task failures the lowest
/// index is reported.
fn collect_outcomes(
    outcomes: Vec<SlotOutcome>,
    expected: usize,
) -> Result<Vec<TaskOutput>, RunError> {
    let mut indexed = Vec::with_capacity(expected);
    let mut first_failure: Option<(usize, WorkloadError)> = None;
    let mut spawn_failure = None;

    for outcome in outcomes {
        match outcome {
            SlotOutcome::Done(outputs) => indexed.extend(outputs),
            SlotOutcome::SpawnFailed(e) => {
                spawn_failure.get_or_insert(e);
            }
            SlotOutcome::TaskFailed(index, cause) => {
                if first_failure.as_ref().is_none_or(|(i, _)| index < *i) {
                    first_failure = Some((index, cause));
                }
            }
        }
    }

    if let Some(e) = spawn_failure {
        return Err(e.into());
    }
    if let Some((index, cause)) = first_failure {
        return Err(RunError::at(index, cause));
    }

    indexed.sort_by_key(|(index, _)| *index);
    if indexed.len() != expected {
        return Err(RunError::PoolExhausted(format!(
            "Internal error: expected {} results, got {}",
            expected,
            indexed.len()
        )));
    }
    Ok(indexed.into_iter().map(|(_, output)| output).collect())
}
