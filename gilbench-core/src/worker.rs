//! Worker Process Entry Point
//!
//! The worker side of the process pool. A worker is the `gilbench` binary
//! started with the worker flag; it executes one task per `Run` command and
//! sends the output back by value.
//!
//! On Unix, uses fd 3/4 for IPC (set via `GILBENCH_IPC_FD`) and installs a
//! SIGTERM handler for graceful shutdown. On non-Unix, falls back to
//! stdin/stdout and skips signal handling.

use crate::error::{WorkloadError, panic_message};
use crate::workload::execute;
use gilbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, SupervisorCommand, Task,
    WorkerCapabilities, WorkerMessage,
};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Set by the SIGTERM handler
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Whether a graceful shutdown has been requested via SIGTERM.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

/// The handler only stores an atomic, so it is async-signal-safe.
#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigterm_handler() {}

enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn parse_fd_pair(value: &str) -> Option<(i32, i32)> {
    let (r, w) = value.split_once(',')?;
    Some((r.trim().parse().ok()?, w.trim().parse().ok()?))
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        if let Some((read_fd, write_fd)) = parse_fd_pair(&val) {
            return IpcTransport::Fds { read_fd, write_fd };
        }
        tracing::warn!(
            "invalid {IPC_FD_ENV}={val:?} (expected <read_fd>,<write_fd>), falling back to stdio"
        );
    }
    IpcTransport::Stdio
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn Read>>,
    writer: FrameWriter<Box<dyn Write>>,
}

impl WorkerMain {
    /// Create a worker on fd 3/4 if `GILBENCH_IPC_FD` is set, otherwise on
    /// stdin/stdout.
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // The supervisor dup2'd both ends onto these descriptors
                // and nothing else in this process owns them.
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::with_io(Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => {
                Self::with_io(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
            }
        }
    }

    /// Create a worker over arbitrary streams
    pub fn with_io(reader: Box<dyn Read>, writer: Box<dyn Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Run the worker main loop until `Shutdown`, end of stream or SIGTERM.
    ///
    /// A failing task is reported to the supervisor and does not end the
    /// loop; only channel errors do.
    pub fn run(&mut self) -> Result<(), FrameError> {
        install_sigterm_handler();

        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::default()))?;

        loop {
            if shutdown_requested() {
                break;
            }

            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                // Supervisor closed the pipe
                Err(FrameError::Closed) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Run { index, task } => {
                    let reply = run_task(index, &task);
                    self.writer.write(&reply)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

fn run_task(index: u64, task: &Task) -> WorkerMessage {
    if let Err(message) = task.validate() {
        return WorkerMessage::Failure {
            index,
            kind: FailureKind::InvalidArgument,
            message,
        };
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| execute(task)));
    match result {
        Ok(Ok(output)) => WorkerMessage::Output { index, output },
        Ok(Err(err)) => WorkerMessage::Failure {
            index,
            kind: match err {
                WorkloadError::InvalidArgument(_) => FailureKind::InvalidArgument,
                _ => FailureKind::Error,
            },
            message: err.to_string(),
        },
        Err(panic) => WorkerMessage::Failure {
            index,
            kind: FailureKind::Panic,
            message: panic_message(panic.as_ref()),
        },
    }
}
