//! Coroutine runner: cooperative tasks on a single-threaded tokio runtime.
//!
//! Waits yield to the event loop and overlap; CPU-bound work never yields,
//! so it runs back to back on the one thread exactly like the sequential
//! baseline. A semaphore caps how many units may be in flight at once.

use super::{Runner, Strategy, check_workers};
use crate::error::{RunError, WorkloadError, panic_message};
use crate::workload::{sum_of_squares, validate_all};
use gilbench_ipc::{Task, TaskOutput};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

/// Execute a task without blocking the event loop during its waits.
pub async fn execute_async(task: Task) -> Result<TaskOutput, WorkloadError> {
    match task {
        Task::SumOfSquares { n } => sum_of_squares(n).map(TaskOutput::Sum),
        Task::Sleep { nanos } => {
            sleep_nanos(nanos).await?;
            Ok(TaskOutput::Unit)
        }
        Task::Mixed { n, nanos } => {
            let sum = sum_of_squares(n)?;
            sleep_nanos(nanos).await?;
            Ok(TaskOutput::Sum(sum))
        }
    }
}

async fn sleep_nanos(nanos: i64) -> Result<(), WorkloadError> {
    if nanos < 0 {
        return Err(WorkloadError::InvalidArgument(format!(
            "wait duration must be >= 0, got {nanos}ns"
        )));
    }
    tokio::time::sleep(Duration::from_nanos(nanos as u64)).await;
    Ok(())
}

/// Run `f` over `inputs` as tasks on a single-threaded event loop, at most
/// `concurrency` of them holding a permit at once.
///
/// The runtime is built for this call and dropped before it returns. When a
/// unit fails, every unit above it is aborted; units below it run on, and
/// the lowest failing index is reported.
pub fn run_cooperative<I, O, F, Fut>(
    inputs: &[I],
    concurrency: usize,
    f: F,
) -> Result<Vec<O>, RunError>
where
    I: Copy + Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<O, WorkloadError>> + Send + 'static,
{
    check_workers(concurrency)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| RunError::PoolExhausted(format!("failed to build runtime: {e}")))?;
    debug!(concurrency, units = inputs.len(), "event loop built");

    let permits = Arc::new(Semaphore::new(concurrency));
    let outcome = runtime.block_on(async {
        let mut set = JoinSet::new();
        let mut index_of = HashMap::with_capacity(inputs.len());
        let mut handles = Vec::with_capacity(inputs.len());
        for (index, &input) in inputs.iter().enumerate() {
            let permits = Arc::clone(&permits);
            let unit = f(input);
            let handle = set.spawn(async move {
                match permits.acquire_owned().await {
                    Ok(_permit) => unit.await,
                    Err(closed) => Err(WorkloadError::Remote(closed.to_string())),
                }
            });
            index_of.insert(handle.id(), index);
            handles.push(handle);
        }

        let mut slots: Vec<Option<O>> = inputs.iter().map(|_| None).collect();
        let mut first_failure: Option<(usize, WorkloadError)> = None;
        while let Some(joined) = set.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_error) if join_error.is_cancelled() => continue,
                Err(join_error) => {
                    let id = join_error.id();
                    let message = match join_error.try_into_panic() {
                        Ok(panic) => panic_message(panic.as_ref()),
                        Err(join_error) => join_error.to_string(),
                    };
                    (id, Err(WorkloadError::Panicked(message)))
                }
            };
            let Some(&index) = index_of.get(&id) else {
                continue;
            };

            match result {
                Ok(output) => slots[index] = Some(output),
                Err(cause) => {
                    if first_failure.as_ref().is_none_or(|(lowest, _)| index < *lowest) {
                        for handle in &handles[index + 1..] {
                            handle.abort();
                        }
                        first_failure = Some((index, cause));
                    }
                }
            }
        }

        if let Some((index, cause)) = first_failure {
            return Err(RunError::at(index, cause));
        }
        slots
            .into_iter()
            .collect::<Option<Vec<O>>>()
            .ok_or_else(|| RunError::PoolExhausted("event loop lost a unit".to_string()))
    });

    // Dropping the runtime cancels any task still pending
    drop(runtime);
    outcome
}

/// Runner that interleaves tasks on one thread
#[derive(Debug, Clone, Copy)]
pub struct CoroutineRunner {
    concurrency: usize,
}

impl CoroutineRunner {
    /// At most `concurrency` tasks hold a permit at the same time
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency }
    }
}

impl Runner for CoroutineRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Coroutines(self.concurrency)
    }

    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError> {
        check_workers(self.concurrency)?;
        validate_all(tasks)?;
        run_cooperative(tasks, self.concurrency, execute_async)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure;
    use crate::runner::SequentialRunner;
    use crate::workload;

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = CoroutineRunner::new(0).run(&[]).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn test_matches_sequential() {
        let tasks = vec![
            Task::SumOfSquares { n: 100 },
            Task::Sleep { nanos: 1_000 },
            Task::Mixed {
                n: 7,
                nanos: 1_000,
            },
        ];
        let expected = SequentialRunner.run(&tasks).unwrap();
        let out = CoroutineRunner::new(2).run(&tasks).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_waits_overlap() {
        let wait = Duration::from_millis(100);
        let tasks = vec![workload::io_for(wait); 3];

        let (out, sample) = measure(|| CoroutineRunner::new(3).run(&tasks));
        assert_eq!(out.unwrap().len(), 3);
        // Three overlapping waits take about one wait, not three
        assert!(sample.elapsed() >= wait);
        assert!(sample.elapsed() < wait * 2);
    }

    #[test]
    fn test_semaphore_limits_concurrency() {
        let wait = Duration::from_millis(60);
        let tasks = vec![workload::io_for(wait); 5];

        let (out, sample) = measure(|| CoroutineRunner::new(2).run(&tasks));
        assert_eq!(out.unwrap().len(), 5);
        // ceil(5 / 2) = 3 rounds of waits
        assert!(sample.elapsed() >= wait * 3);
        assert!(sample.elapsed() < wait * 5);
    }

    #[test]
    fn test_failure_aborts_later_units() {
        let inputs: Vec<u64> = (0..4).collect();
        let (out, sample) = measure(|| {
            run_cooperative(&inputs, 4, |i| async move {
                if i == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    return Err(WorkloadError::Remote("unit 0".to_string()));
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(i)
            })
        });

        assert!(matches!(
            out,
            Err(RunError::WorkloadFailed { index: 0, .. })
        ));
        assert!(sample.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_lowest_failing_index_wins() {
        let inputs: Vec<u64> = (0..4).collect();
        let err = run_cooperative(&inputs, 4, |i| async move {
            match i {
                1 => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(WorkloadError::Remote("late".to_string()))
                }
                3 => Err(WorkloadError::Remote("early".to_string())),
                _ => Ok(i),
            }
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

    #[test]
    fn test_panicking_unit_reports_its_index() {
        let inputs: Vec<u64> = (0..3).collect();
        let err = run_cooperative(&inputs, 2, |i| async move {
            if i == 2 {
                panic!("unit panic");
            }
            Ok(i)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            RunError::WorkloadFailed {
                index: 2,
                cause: WorkloadError::Panicked(_)
            }
        ));
    }

    #[test]
    fn test_invalid_task_rejected() {
        let err = CoroutineRunner::new(1)
            .run(&[Task::Sleep { nanos: -1 }])
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }
}
