//! Thread-pool runner: a fixed rayon pool of OS threads in one address space.
//!
//! Workers pull units from the pool's shared work queue, so completion order
//! is arbitrary; the indexed parallel iterator puts outputs back in
//! submission order.
//!
//! Under a global interpreter lock this strategy gives no speedup on
//! CPU-bound work, because only one thread may execute interpreted code at a
//! time. Rust threads have no such lock, so here CPU-bound work scales with
//! the number of cores.

use super::{Runner, Strategy, check_workers, guarded};
use crate::error::{RunError, WorkloadError};
use crate::workload::{execute, validate_all};
use gilbench_ipc::{Task, TaskOutput};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Run `f` over `inputs` on a pool of `workers` threads.
///
/// The pool is scoped to this call: its threads are joined before the
/// function returns, whether the batch succeeded or failed.
///
/// On failure the lowest failing index is reported, as a sequential run
/// would. Once a unit has failed, units above it are skipped; units below
/// it still run, since one of them may fail too.
pub fn run_threaded<I, O, F>(inputs: &[I], workers: usize, f: F) -> Result<Vec<O>, RunError>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> Result<O, WorkloadError> + Sync,
{
    check_workers(workers)?;

    let first_failure = AtomicUsize::new(usize::MAX);
    let slots = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("gilbench-worker-{i}"))
        .build_scoped(
            |thread| thread.run(),
            |pool| {
                debug!(workers, units = inputs.len(), "thread pool built");
                pool.install(|| {
                    inputs
                        .par_iter()
                        .enumerate()
                        .map(|(index, input)| {
                            if index > first_failure.load(Ordering::Acquire) {
                                return None;
                            }
                            let result = guarded(|| f(input));
                            if result.is_err() {
                                first_failure.fetch_min(index, Ordering::AcqRel);
                            }
                            Some(result)
                        })
                        .collect::<Vec<_>>()
                })
            },
        )
        .map_err(|e| RunError::PoolExhausted(format!("failed to build thread pool: {e}")))?;

    let outcome = collect_in_order(slots);
    debug!(workers, ok = outcome.is_ok(), "thread pool joined");
    outcome
}

/// Outputs in submission order, or the lowest-index failure.
///
/// A skipped slot always sits above a failed one, so the scan returns
/// before reaching it.
fn collect_in_order<O>(slots: Vec<Option<Result<O, WorkloadError>>>) -> Result<Vec<O>, RunError> {
    let mut outputs = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(output)) => outputs.push(output),
            Some(Err(cause)) => return Err(RunError::at(index, cause)),
            None => {
                return Err(RunError::PoolExhausted(format!(
                    "unit {index} was skipped without a failure below it"
                )));
            }
        }
    }
    Ok(outputs)
}

/// Runner backed by a fixed-size thread pool
#[derive(Debug, Clone, Copy)]
pub struct ThreadPoolRunner {
    workers: usize,
}

impl ThreadPoolRunner {
    /// Create a runner with `workers` threads
    pub fn new(workers: usize) -> Self {
        Self { workers }
    }
}

impl Runner for ThreadPoolRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Threads(self.workers)
    }

    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError> {
        validate_all(tasks)?;
        run_threaded(tasks, self.workers, execute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SequentialRunner;
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        let err = ThreadPoolRunner::new(0).run(&[]).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn test_matches_sequential_in_order() {
        let tasks: Vec<Task> = (0..32).map(|i| Task::SumOfSquares { n: i * 1_000 }).collect();
        let expected = SequentialRunner.run(&tasks).unwrap();

        for workers in [1, 2, 3, 8] {
            let out = ThreadPoolRunner::new(workers).run(&tasks).unwrap();
            assert_eq!(out, expected, "workers = {workers}");
        }
    }

    #[test]
    fn test_order_preserved_when_completion_is_reversed() {
        // Earlier units sleep longer, so they finish last
        let inputs: Vec<u64> = (0..6).collect();
        let out = run_threaded(&inputs, 6, |&i| {
            std::thread::sleep(Duration::from_millis(5 * (6 - i)));
            Ok(i * 10)
        })
        .unwrap();
        assert_eq!(out, vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_failure_reports_index() {
        let inputs: Vec<u32> = (0..16).collect();
        let err = run_threaded(&inputs, 4, |&i| {
            if i == 11 {
                Err(WorkloadError::Remote("unit 11".to_string()))
            } else {
                Ok(i)
            }
        })
        .unwrap_err();

        match err {
            RunError::WorkloadFailed { index, cause } => {
                assert_eq!(index, 11);
                assert_eq!(cause, WorkloadError::Remote("unit 11".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lowest_failing_index_wins() {
        // Unit 1 fails late, unit 14 fails at once; a sequential run stops at 1
        let inputs: Vec<u32> = (0..16).collect();
        for _ in 0..5 {
            let err = run_threaded(&inputs, 4, |&i| match i {
                1 => {
                    std::thread::sleep(Duration::from_millis(50));
                    Err(WorkloadError::Remote("late".to_string()))
                }
                14 => Err(WorkloadError::Remote("early".to_string())),
                _ => Ok(i),
            })
            .unwrap_err();

            match err {
                RunError::WorkloadFailed { index, cause } => {
                    assert_eq!(index, 1);
                    assert_eq!(cause, WorkloadError::Remote("late".to_string()));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_skipped_slot_without_failure_is_an_error() {
        let slots: Vec<Option<Result<u8, WorkloadError>>> = vec![Some(Ok(1)), None];
        assert!(matches!(
            collect_in_order(slots),
            Err(RunError::PoolExhausted(_))
        ));
    }

    #[test]
    fn test_panic_in_worker_is_caught() {
        let inputs = [0u8, 1, 2];
        let err = run_threaded(&inputs, 2, |&i| -> Result<u8, WorkloadError> {
            if i == 1 {
                panic!("worker panic");
            }
            Ok(i)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            RunError::WorkloadFailed {
                index: 1,
                cause: WorkloadError::Panicked(_)
            }
        ));
    }

    #[test]
    fn test_every_unit_runs_exactly_once() {
        let calls = AtomicUsize::new(0);
        let inputs: Vec<usize> = (0..100).collect();
        let out = run_threaded(&inputs, 4, |&i| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(i)
        })
        .unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(calls.load(Ordering::Relaxed), 100);
    }
}
