//! Workloads
//!
//! The CPU-bound and I/O-bound units of work every runner executes. Both are
//! pure apart from the time they take: the same [`Task`] always produces the
//! same [`TaskOutput`], whichever strategy runs it.

use crate::error::WorkloadError;
use gilbench_ipc::{Task, TaskOutput};
use std::hint::black_box;
use std::time::Duration;

/// Build a CPU-bound task summing squares over `0..n`.
pub fn cpu(n: i64) -> Result<Task, WorkloadError> {
    checked(Task::SumOfSquares { n })
}

/// Build an I/O-bound task waiting `seconds`.
pub fn io(seconds: f64) -> Result<Task, WorkloadError> {
    let nanos = seconds_to_nanos(seconds)?;
    checked(Task::Sleep { nanos })
}

/// Build a task that sums squares over `0..n`, then waits `seconds`.
pub fn mixed(n: i64, seconds: f64) -> Result<Task, WorkloadError> {
    let nanos = seconds_to_nanos(seconds)?;
    checked(Task::Mixed { n, nanos })
}

/// Build an I/O-bound task from a duration (saturates at ~292 years).
pub fn io_for(duration: Duration) -> Task {
    Task::Sleep {
        nanos: i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX),
    }
}

/// Build a mixed task from a duration.
pub fn mixed_for(n: i64, duration: Duration) -> Result<Task, WorkloadError> {
    let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
    checked(Task::Mixed { n, nanos })
}

fn checked(task: Task) -> Result<Task, WorkloadError> {
    task.validate().map_err(WorkloadError::InvalidArgument)?;
    Ok(task)
}

fn seconds_to_nanos(seconds: f64) -> Result<i64, WorkloadError> {
    if !seconds.is_finite() {
        return Err(WorkloadError::InvalidArgument(format!(
            "wait duration must be finite, got {seconds}"
        )));
    }
    if seconds < 0.0 {
        return Err(WorkloadError::InvalidArgument(format!(
            "wait duration must be >= 0, got {seconds}s"
        )));
    }
    let nanos = (seconds * 1e9).round();
    if nanos > i64::MAX as f64 {
        return Err(WorkloadError::InvalidArgument(format!(
            "wait duration too large: {seconds}s"
        )));
    }
    Ok(nanos as i64)
}

/// Sum of `i * i` for `i` in `0..n`.
///
/// Iterates without materializing the range. Checked arithmetic keeps the
/// loop honest (no closed-form shortcut by the optimizer) and turns overflow
/// into an error instead of a wrapped value.
pub fn sum_of_squares(n: i64) -> Result<u128, WorkloadError> {
    if n < 0 {
        return Err(WorkloadError::InvalidArgument(format!(
            "n must be >= 0, got {n}"
        )));
    }
    let n = black_box(n as u64);
    let mut total: u128 = 0;
    for i in 0..n {
        let wide = u128::from(i);
        total = wide
            .checked_mul(wide)
            .and_then(|sq| total.checked_add(sq))
            .ok_or(WorkloadError::Overflow(i))?;
    }
    Ok(total)
}

/// Block the calling thread for `nanos` without consuming CPU.
pub fn wait(nanos: i64) -> Result<(), WorkloadError> {
    if nanos < 0 {
        return Err(WorkloadError::InvalidArgument(format!(
            "wait duration must be >= 0, got {nanos}ns"
        )));
    }
    std::thread::sleep(Duration::from_nanos(nanos as u64));
    Ok(())
}

/// Execute a task on the calling thread.
pub fn execute(task: &Task) -> Result<TaskOutput, WorkloadError> {
    match *task {
        Task::SumOfSquares { n } => sum_of_squares(n).map(TaskOutput::Sum),
        Task::Sleep { nanos } => wait(nanos).map(|()| TaskOutput::Unit),
        Task::Mixed { n, nanos } => {
            let sum = sum_of_squares(n)?;
            wait(nanos)?;
            Ok(TaskOutput::Sum(sum))
        }
    }
}

/// Validate every task in a batch before anything runs.
pub fn validate_all(tasks: &[Task]) -> Result<(), crate::RunError> {
    for (index, task) in tasks.iter().enumerate() {
        task.validate()
            .map_err(|msg| crate::RunError::InvalidArgument(format!("task {index}: {msg}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sum_of_squares_small() {
        assert_eq!(sum_of_squares(0).unwrap(), 0);
        assert_eq!(sum_of_squares(1).unwrap(), 0);
        assert_eq!(sum_of_squares(4).unwrap(), 1 + 4 + 9);
    }

    #[test]
    fn test_sum_of_squares_matches_closed_form() {
        let n: u128 = 10_000;
        let expected = (n - 1) * n * (2 * n - 1) / 6;
        assert_eq!(sum_of_squares(n as i64).unwrap(), expected);
    }

    #[test]
    fn test_sum_exceeds_u64() {
        // 5M is the size the GIL demo uses; its sum does not fit in u64
        let sum = sum_of_squares(5_000_000).unwrap();
        assert!(sum > u128::from(u64::MAX));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(matches!(
            sum_of_squares(-1),
            Err(WorkloadError::InvalidArgument(_))
        ));
        assert!(matches!(wait(-1), Err(WorkloadError::InvalidArgument(_))));
        assert!(matches!(cpu(-3), Err(WorkloadError::InvalidArgument(_))));
        assert!(matches!(io(-0.5), Err(WorkloadError::InvalidArgument(_))));
        assert!(matches!(
            mixed(-1, 0.1),
            Err(WorkloadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_non_finite_wait_rejected() {
        assert!(io(f64::NAN).is_err());
        assert!(io(f64::INFINITY).is_err());
        assert!(io(1e300).is_err());
    }

    #[test]
    fn test_io_conversion() {
        assert_eq!(io(0.25).unwrap(), Task::Sleep { nanos: 250_000_000 });
        assert_eq!(
            io_for(Duration::from_millis(3)),
            Task::Sleep { nanos: 3_000_000 }
        );
    }

    #[test]
    fn test_wait_blocks_for_duration() {
        let start = Instant::now();
        let out = execute(&io(0.02).unwrap()).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(out, TaskOutput::Unit);
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn test_mixed_returns_sum() {
        let out = execute(&mixed(4, 0.0).unwrap()).unwrap();
        assert_eq!(out, TaskOutput::Sum(14));
    }

    #[test]
    fn test_validate_all_names_index() {
        let tasks = [Task::SumOfSquares { n: 1 }, Task::Sleep { nanos: -1 }];
        let err = validate_all(&tasks).unwrap_err();
        assert!(err.to_string().contains("task 1"));
    }
}
