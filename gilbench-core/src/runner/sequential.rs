//! Sequential baseline: every unit on the calling thread, in call order.

use super::{Runner, Strategy, guarded};
use crate::error::{RunError, WorkloadError};
use crate::workload::{execute, validate_all};
use gilbench_ipc::{Task, TaskOutput};

/// Run `f` over `inputs` one after another, stopping at the first failure.
pub fn run_sequential<I, O, F>(inputs: &[I], f: F) -> Result<Vec<O>, RunError>
where
    F: Fn(&I) -> Result<O, WorkloadError>,
{
    let mut outputs = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let output = guarded(|| f(input)).map_err(|cause| RunError::at(index, cause))?;
        outputs.push(output);
    }
    Ok(outputs)
}

/// Baseline runner all other strategies are compared against
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialRunner;

impl Runner for SequentialRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Sequential
    }

    fn run(&self, tasks: &[Task]) -> Result<Vec<TaskOutput>, RunError> {
        validate_all(tasks)?;
        run_sequential(tasks, execute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_empty_batch() {
        let out = SequentialRunner.run(&[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_outputs_in_call_order() {
        let tasks: Vec<Task> = (0..6).map(|n| Task::SumOfSquares { n }).collect();
        let out = SequentialRunner.run(&tasks).unwrap();
        assert_eq!(
            out,
            vec![
                TaskOutput::Sum(0),
                TaskOutput::Sum(0),
                TaskOutput::Sum(1),
                TaskOutput::Sum(5),
                TaskOutput::Sum(14),
                TaskOutput::Sum(30),
            ]
        );
    }

    #[test]
    fn test_invocation_order_is_call_order() {
        let seen = RefCell::new(Vec::new());
        let inputs = [3, 1, 2];
        run_sequential(&inputs, |&i| {
            seen.borrow_mut().push(i);
            Ok(())
        })
        .unwrap();
        assert_eq!(*seen.borrow(), vec![3, 1, 2]);
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let calls = RefCell::new(0);
        let inputs: Vec<u32> = (0..10).collect();
        let err = run_sequential(&inputs, |&i| {
            *calls.borrow_mut() += 1;
            if i == 4 {
                Err(WorkloadError::Remote("bad unit".to_string()))
            } else {
                Ok(i)
            }
        })
        .unwrap_err();

        assert!(matches!(err, RunError::WorkloadFailed { index: 4, .. }));
        assert_eq!(*calls.borrow(), 5, "no unit after the failure may run");
    }

    #[test]
    fn test_panic_surfaces_as_workload_failed() {
        let err = run_sequential(&[1, 2], |&i: &i32| -> Result<i32, WorkloadError> {
            if i == 2 {
                panic!("unit {i} exploded");
            }
            Ok(i)
        })
        .unwrap_err();

        match err {
            RunError::WorkloadFailed { index, cause } => {
                assert_eq!(index, 1);
                assert_eq!(cause, WorkloadError::Panicked("unit 2 exploded".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_task_rejected_before_running() {
        let tasks = [Task::Sleep { nanos: 10_000_000_000 }, Task::SumOfSquares { n: -1 }];
        let (outcome, sample) = crate::measure(|| SequentialRunner.run(&tasks));
        assert!(matches!(outcome, Err(RunError::InvalidArgument(_))));
        // The 10s sleep at index 0 must not have started
        assert!(sample.elapsed().as_secs() < 1);
    }
}
