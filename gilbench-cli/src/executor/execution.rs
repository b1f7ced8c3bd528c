//! Scenario Execution
//!
//! Runs every planned scenario and turns the outcomes into report entries.
//!
//! ## Data Flow
//!
//! ```text
//! Scenario (from the catalogue)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │  Executor        │  baseline run → candidate runs, each timed
//! └────────┬─────────┘
//!          │
//!          ▼
//!  ScenarioReport / RaceReport (elapsed, speedup, status, outputs match)
//! ```
//!
//! Every runner invocation is timed on its own with
//! [`gilbench_core::measure`]; a failing run is timed and reported like a
//! successful one, it just has no speedup.

use crate::planner::ExecutionPlan;
use crate::scenario::{Scenario, ScenarioKind};
use crate::supervisor::ProcessPoolRunner;
use gilbench_core::{
    CoroutineRunner, LockedCounter, RacyCounter, RunError, Runner, SequentialRunner, Strategy,
    Task, TaskOutput, ThreadPoolRunner, measure, race,
};
use gilbench_report::{
    RaceEntry, RaceReport, RunStatus, ScenarioReport, Speedup, StrategyEntry,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for scenario execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Binary started in worker mode by the process pool (current
    /// executable if unset)
    pub worker_binary: Option<PathBuf>,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

/// Result of the sequential run, kept to compare candidates against
struct Baseline {
    elapsed: Duration,
    outputs: Option<Vec<TaskOutput>>,
}

/// Executes scenarios and produces report entries
pub struct Executor {
    config: ExecutionConfig,
}

impl Executor {
    /// Create an executor
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Build the runner for a strategy
    pub fn runner_for(&self, strategy: Strategy) -> Box<dyn Runner> {
        match strategy {
            Strategy::Sequential => Box::new(SequentialRunner),
            Strategy::Threads(n) => Box::new(ThreadPoolRunner::new(n)),
            Strategy::Coroutines(n) => Box::new(CoroutineRunner::new(n)),
            Strategy::Processes(n) => match &self.config.worker_binary {
                Some(binary) => Box::new(ProcessPoolRunner::with_binary(n, binary.clone())),
                None => Box::new(ProcessPoolRunner::new(n)),
            },
        }
    }

    /// Execute every scenario of the plan, in order
    pub fn execute(&self, plan: &ExecutionPlan) -> (Vec<ScenarioReport>, Vec<RaceReport>) {
        let total_runs: usize = plan
            .scenarios
            .iter()
            .map(|s| match &s.kind {
                ScenarioKind::Compare { strategies, .. } => strategies.len(),
                ScenarioKind::Race { .. } => 2,
            })
            .sum();

        let pb = if self.config.show_progress {
            ProgressBar::new(total_runs as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut scenarios = Vec::new();
        let mut races = Vec::new();
        for scenario in &plan.scenarios {
            match &scenario.kind {
                ScenarioKind::Compare { tasks, strategies } => {
                    scenarios.push(self.run_compare(scenario, tasks, strategies, &pb));
                }
                ScenarioKind::Race {
                    threads,
                    increments,
                } => {
                    races.push(run_race(scenario, *threads, *increments, &pb));
                }
            }
        }

        pb.finish_and_clear();
        (scenarios, races)
    }

    fn run_compare(
        &self,
        scenario: &Scenario,
        tasks: &[Task],
        strategies: &[Strategy],
        pb: &ProgressBar,
    ) -> ScenarioReport {
        let mut entries = Vec::with_capacity(strategies.len());
        let mut baseline: Option<Baseline> = None;

        for (position, &strategy) in strategies.iter().enumerate() {
            pb.set_message(format!("{} [{}]", scenario.id, strategy));
            let runner = self.runner_for(strategy);
            let (outcome, sample) = runner.run_timed(tasks);
            let elapsed = sample.elapsed();

            match &outcome {
                Ok(_) => info!(
                    scenario = scenario.id,
                    strategy = %strategy,
                    elapsed_ms = elapsed.as_secs_f64() * 1e3,
                    "run completed"
                ),
                Err(e) => warn!(scenario = scenario.id, strategy = %strategy, "run failed: {e}"),
            }

            if position == 0 {
                entries.push(build_entry(strategy, &outcome, elapsed, None));
                baseline = Some(Baseline {
                    elapsed,
                    outputs: outcome.ok(),
                });
            } else {
                entries.push(build_entry(strategy, &outcome, elapsed, baseline.as_ref()));
            }
            pb.inc(1);
        }

        ScenarioReport {
            id: scenario.id.to_string(),
            title: scenario.title.to_string(),
            tags: scenario.tags.iter().map(|t| t.to_string()).collect(),
            note: scenario.note.to_string(),
            units: tasks.len(),
            entries,
        }
    }
}

/// Turn one timed runner invocation into a report entry.
///
/// Speedup and output comparison only make sense when both this run and
/// the baseline completed.
fn build_entry(
    strategy: Strategy,
    outcome: &Result<Vec<TaskOutput>, RunError>,
    elapsed: Duration,
    baseline: Option<&Baseline>,
) -> StrategyEntry {
    let (status, outputs) = match outcome {
        Ok(outputs) => (RunStatus::Completed, Some(outputs)),
        Err(e) => (
            RunStatus::Failed {
                message: e.to_string(),
            },
            None,
        ),
    };

    let (speedup, outputs_match) = match (baseline, outputs) {
        (
            Some(Baseline {
                elapsed: base_elapsed,
                outputs: Some(base_outputs),
            }),
            Some(outputs),
        ) => (
            Some(Speedup::compute(*base_elapsed, elapsed)),
            Some(base_outputs == outputs),
        ),
        _ => (None, None),
    };

    StrategyEntry {
        strategy: strategy.to_string(),
        kind: strategy.kind().to_string(),
        workers: strategy.workers(),
        elapsed_ns: u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
        speedup,
        status,
        outputs_match,
    }
}

fn run_race(scenario: &Scenario, threads: usize, increments: u64, pb: &ProgressBar) -> RaceReport {
    let racy = RacyCounter::new();
    let locked = LockedCounter::new();
    let counters: [(&dyn gilbench_core::Counter, bool); 2] = [(&racy, false), (&locked, true)];

    let entries = counters
        .into_iter()
        .map(|(counter, must_be_exact)| {
            pb.set_message(format!("{} [{}]", scenario.id, counter.name()));
            let (outcome, sample) = measure(|| race(counter, threads, increments));
            info!(
                counter = counter.name(),
                expected = outcome.expected,
                actual = outcome.actual,
                lost = outcome.lost,
                "race completed"
            );
            pb.inc(1);
            RaceEntry {
                counter: counter.name().to_string(),
                must_be_exact,
                expected: outcome.expected,
                actual: outcome.actual,
                lost: outcome.lost,
                elapsed_ns: u64::try_from(sample.elapsed().as_nanos()).unwrap_or(u64::MAX),
            }
        })
        .collect();

    RaceReport {
        id: scenario.id.to_string(),
        title: scenario.title.to_string(),
        note: scenario.note.to_string(),
        threads,
        increments,
        entries,
    }
}
