//! Report Data Structures

use crate::speedup::Speedup;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report metadata
    pub meta: ReportMeta,
    /// Timed scenarios, in catalogue order
    pub scenarios: Vec<ScenarioReport>,
    /// Shared-counter races
    pub races: Vec<RaceReport>,
    /// Summary statistics
    pub summary: ReportSummary,
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// JSON schema version
    pub schema_version: u32,
    /// gilbench version
    pub version: String,
    /// Report generation time
    pub timestamp: DateTime<Utc>,
    /// Machine the numbers come from
    pub system: SystemInfo,
    /// Sizes the run was configured with
    pub config: ReportConfig,
}

/// Execution configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Pool size for the two-way scenarios
    pub workers: usize,
    /// Pool size for the executor comparison
    pub executor_workers: usize,
    /// Workloads were scaled down for a smoke run
    pub quick: bool,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// CPU architecture
    pub arch: String,
    /// CPU model name ("Unknown" when unavailable)
    pub cpu: String,
    /// Logical cores available to the process
    pub cpu_cores: u32,
}

/// One scenario: the same batch run under a baseline and several candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario identifier
    pub id: String,
    /// One-line description
    pub title: String,
    /// Scenario tags
    pub tags: Vec<String>,
    /// What the numbers are expected to show
    pub note: String,
    /// Number of tasks in the batch (K)
    pub units: usize,
    /// First entry is the sequential baseline
    pub entries: Vec<StrategyEntry>,
}

impl ScenarioReport {
    /// The baseline entry, if the scenario ran at all
    pub fn baseline(&self) -> Option<&StrategyEntry> {
        self.entries.first()
    }

    /// Entries compared against the baseline
    pub fn candidates(&self) -> &[StrategyEntry] {
        self.entries.get(1..).unwrap_or(&[])
    }
}

/// One runner invocation inside a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyEntry {
    /// Display label, e.g. "2 thread(s)"
    pub strategy: String,
    /// Machine-friendly kind, e.g. "threads"
    pub kind: String,
    /// Pool size (1 for sequential)
    pub workers: usize,
    /// Wall-clock time of the whole invocation, in nanoseconds
    pub elapsed_ns: u64,
    /// Speedup against the baseline (`None` for the baseline itself or when
    /// the baseline failed)
    pub speedup: Option<Speedup>,
    /// Completed or failed
    pub status: RunStatus,
    /// Whether the outputs equal the baseline's (`None` when not comparable)
    pub outputs_match: Option<bool>,
}

impl StrategyEntry {
    /// Elapsed wall-clock time
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }

    /// Whether the invocation completed
    pub fn is_completed(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// Terminal state of a runner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RunStatus {
    /// Every unit produced an output
    Completed,
    /// The invocation failed; partial results were discarded
    Failed {
        /// Error description
        message: String,
    },
}

/// Shared-counter race between threads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceReport {
    /// Scenario identifier
    pub id: String,
    /// One-line description
    pub title: String,
    /// What the numbers are expected to show
    pub note: String,
    /// Concurrent threads (T)
    pub threads: usize,
    /// Increments per thread (C)
    pub increments: u64,
    /// One entry per counter implementation
    pub entries: Vec<RaceEntry>,
}

/// Outcome for one counter implementation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEntry {
    /// "racy" or "locked"
    pub counter: String,
    /// Whether lost increments are a failure for this counter
    pub must_be_exact: bool,
    /// T × C
    pub expected: u64,
    /// Final counter value
    pub actual: u64,
    /// `expected - actual`
    pub lost: u64,
    /// Wall-clock time of the race, in nanoseconds
    pub elapsed_ns: u64,
}

impl RaceEntry {
    /// A guarded counter that lost increments
    pub fn is_violation(&self) -> bool {
        self.must_be_exact && self.lost > 0
    }
}

/// Report summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Scenarios and races run
    pub total_scenarios: usize,
    /// Runner invocations and counter races
    pub total_runs: usize,
    /// Runs that completed
    pub completed: usize,
    /// Runs that failed
    pub failed: usize,
    /// Candidates whose outputs differ from the baseline
    pub diverged: usize,
    /// Guarded counters that lost increments
    pub race_violations: usize,
    /// Increments lost by unguarded counters (expected, not a failure)
    pub lost_updates: u64,
    /// Wall-clock time of the whole run, in milliseconds
    pub total_duration_ms: f64,
}

impl ReportSummary {
    /// Tally scenario and race results
    pub fn compute(
        scenarios: &[ScenarioReport],
        races: &[RaceReport],
        total_duration: Duration,
    ) -> Self {
        let mut summary = ReportSummary {
            total_scenarios: scenarios.len() + races.len(),
            total_duration_ms: total_duration.as_secs_f64() * 1e3,
            ..Default::default()
        };

        for entry in scenarios.iter().flat_map(|s| &s.entries) {
            summary.total_runs += 1;
            if entry.is_completed() {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
            if entry.outputs_match == Some(false) {
                summary.diverged += 1;
            }
        }

        for entry in races.iter().flat_map(|r| &r.entries) {
            summary.total_runs += 1;
            summary.completed += 1;
            if entry.is_violation() {
                summary.race_violations += 1;
            } else if !entry.must_be_exact {
                summary.lost_updates += entry.lost;
            }
        }

        summary
    }

    /// No failure, divergence or guarded-counter loss
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.diverged == 0 && self.race_violations == 0
    }
}
