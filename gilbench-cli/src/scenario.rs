//! Scenario Catalogue
//!
//! Each scenario runs one batch of tasks under a sequential baseline and
//! one or more candidate strategies, or races threads on a shared counter.
//! Sizes come from [`GilConfig`]; `--quick` scales them down.

use crate::config::GilConfig;
use gilbench_core::{Strategy, Task, workload};
use std::time::Duration;

/// What a scenario executes
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioKind {
    /// Same batch under each strategy; the first is the baseline
    Compare {
        /// The batch (K tasks)
        tasks: Vec<Task>,
        /// Baseline first, then candidates
        strategies: Vec<Strategy>,
    },
    /// Racy and locked counters, `threads` × `increments`
    Race {
        /// Concurrent threads
        threads: usize,
        /// Increments per thread
        increments: u64,
    },
}

/// One entry of the catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Stable identifier, matched by the CLI filter
    pub id: &'static str,
    /// One-line description
    pub title: &'static str,
    /// Tags for `--tag` / `--skip-tag`
    pub tags: &'static [&'static str],
    /// Expected outcome, printed with the results
    pub note: &'static str,
    /// What to execute
    pub kind: ScenarioKind,
}

impl Scenario {
    /// Number of tasks in the batch (0 for races)
    pub fn units(&self) -> usize {
        match &self.kind {
            ScenarioKind::Compare { tasks, .. } => tasks.len(),
            ScenarioKind::Race { .. } => 0,
        }
    }

    /// Whether the scenario needs worker processes
    pub fn uses_processes(&self) -> bool {
        matches!(&self.kind, ScenarioKind::Compare { strategies, .. }
            if strategies.iter().any(|s| matches!(s, Strategy::Processes(_))))
    }
}

/// Resolved sizes for building the catalogue
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParams {
    /// Sum-of-squares bound of one CPU-bound task
    pub cpu_n: i64,
    /// Wait of one I/O-bound task
    pub io_time: Duration,
    /// CPU part of one mixed task
    pub mixed_n: i64,
    /// Wait part of one mixed task
    pub mixed_io_time: Duration,
    /// Sum-of-squares bound in the executor comparison
    pub executor_n: i64,
    /// Wait per task in the semaphore scenario
    pub semaphore_io_time: Duration,
    /// Tasks per batch and pool size for threads and processes
    pub workers: usize,
    /// Tasks and pool size in the executor comparison
    pub executor_workers: usize,
    /// Threads in each counter race
    pub race_threads: usize,
    /// Increments per race thread
    pub race_increments: u64,
}

impl ScenarioParams {
    /// Resolve durations from the configuration, then apply overrides.
    ///
    /// `quick` divides CPU sizes by 100 and waits and increments by 10.
    pub fn from_config(
        config: &GilConfig,
        workers: Option<usize>,
        quick: bool,
    ) -> anyhow::Result<Self> {
        let w = &config.workloads;
        let mut params = Self {
            cpu_n: w.cpu_n,
            io_time: GilConfig::duration(&w.io_time)?,
            mixed_n: w.mixed_n,
            mixed_io_time: GilConfig::duration(&w.mixed_io_time)?,
            executor_n: w.executor_n,
            semaphore_io_time: GilConfig::duration(&w.semaphore_io_time)?,
            workers: workers.unwrap_or(config.runner.workers),
            executor_workers: config.runner.executor_workers,
            race_threads: config.race.threads,
            race_increments: config.race.increments,
        };

        if quick {
            params.cpu_n /= 100;
            params.mixed_n /= 100;
            params.executor_n /= 100;
            params.io_time /= 10;
            params.mixed_io_time /= 10;
            params.semaphore_io_time /= 10;
            params.race_increments /= 10;
        }

        if params.workers == 0 || params.executor_workers == 0 {
            anyhow::bail!("worker counts must be >= 1");
        }
        Ok(params)
    }
}

/// Build the full catalogue, in presentation order.
pub fn catalogue(p: &ScenarioParams) -> anyhow::Result<Vec<Scenario>> {
    let cpu = workload::cpu(p.cpu_n)?;
    let io = workload::io_for(p.io_time);
    let mixed = workload::mixed_for(p.mixed_n, p.mixed_io_time)?;
    let executor_cpu = workload::cpu(p.executor_n)?;
    let semaphore_io = workload::io_for(p.semaphore_io_time);
    let w = p.workers;
    let ew = p.executor_workers;

    Ok(vec![
        Scenario {
            id: "cpu-threads",
            title: "CPU-bound: sequential vs threads",
            tags: &["cpu", "threads"],
            note: "Under a GIL only one thread runs interpreted code at a time, so this \
                   shows ~1x. Rust threads have no such lock: expect a speedup approaching \
                   min(workers, cores).",
            kind: ScenarioKind::Compare {
                tasks: vec![cpu; w],
                strategies: vec![Strategy::Sequential, Strategy::Threads(w)],
            },
        },
        Scenario {
            id: "cpu-processes",
            title: "CPU-bound: sequential vs processes",
            tags: &["cpu", "processes"],
            note: "Separate address spaces, tasks and outputs copied over pipes. Expect a \
                   speedup approaching min(workers, cores), minus process start-up.",
            kind: ScenarioKind::Compare {
                tasks: vec![cpu; w],
                strategies: vec![Strategy::Sequential, Strategy::Processes(w)],
            },
        },
        Scenario {
            id: "io-threads",
            title: "I/O-bound: sequential vs threads",
            tags: &["io", "threads"],
            note: "Waits overlap, with or without a GIL: expect ~Kx (K waits finish in \
                   about one wait).",
            kind: ScenarioKind::Compare {
                tasks: vec![io; w],
                strategies: vec![Strategy::Sequential, Strategy::Threads(w)],
            },
        },
        Scenario {
            id: "mixed-threads",
            title: "Mixed CPU + I/O: sequential vs threads",
            tags: &["cpu", "io", "threads"],
            note: "Under a GIL only the waits overlap, giving between 1x and 2x. Here the \
                   CPU parts run in parallel too.",
            kind: ScenarioKind::Compare {
                tasks: vec![mixed; w],
                strategies: vec![Strategy::Sequential, Strategy::Threads(w)],
            },
        },
        Scenario {
            id: "executors",
            title: "Executors: thread pool vs process pool",
            tags: &["cpu", "threads", "processes"],
            note: "Under a GIL only the process pool scales on CPU-bound work. Both pools \
                   scale here; the process pool pays for start-up and copying.",
            kind: ScenarioKind::Compare {
                tasks: vec![executor_cpu; ew],
                strategies: vec![
                    Strategy::Sequential,
                    Strategy::Threads(ew),
                    Strategy::Processes(ew),
                ],
            },
        },
        Scenario {
            id: "async-io",
            title: "Coroutines: concurrent waits on one thread",
            tags: &["io", "async"],
            note: "Three waits on a single-threaded event loop overlap: expect ~3x.",
            kind: ScenarioKind::Compare {
                tasks: vec![io; 3],
                strategies: vec![Strategy::Sequential, Strategy::Coroutines(3)],
            },
        },
        Scenario {
            id: "async-semaphore",
            title: "Coroutines: semaphore limits concurrency",
            tags: &["io", "async"],
            note: "Five waits, at most two in flight: three rounds, expect ~1.67x.",
            kind: ScenarioKind::Compare {
                tasks: vec![semaphore_io; 5],
                strategies: vec![Strategy::Sequential, Strategy::Coroutines(2)],
            },
        },
        Scenario {
            id: "race",
            title: "Shared counter: race condition",
            tags: &["race", "threads"],
            note: "A read-modify-write without a lock loses increments when threads \
                   interleave (not on every run). The locked counter is always exact.",
            kind: ScenarioKind::Race {
                threads: p.race_threads,
                increments: p.race_increments,
            },
        },
    ])
}

/// All tags used by the catalogue, sorted
pub fn all_tags(scenarios: &[Scenario]) -> Vec<&'static str> {
    let mut tags: Vec<_> = scenarios.iter().flat_map(|s| s.tags.iter().copied()).collect();
    tags.sort_unstable();
    tags.dedup();
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ScenarioParams {
        ScenarioParams::from_config(&GilConfig::default(), None, false).unwrap()
    }

    #[test]
    fn test_defaults_resolve() {
        let p = params();
        assert_eq!(p.cpu_n, 50_000_000);
        assert_eq!(p.io_time, Duration::from_secs(1));
        assert_eq!(p.semaphore_io_time, Duration::from_millis(500));
        assert_eq!(p.workers, 2);
    }

    #[test]
    fn test_quick_scales_down() {
        let p = ScenarioParams::from_config(&GilConfig::default(), None, true).unwrap();
        assert_eq!(p.cpu_n, 500_000);
        assert_eq!(p.io_time, Duration::from_millis(100));
        assert_eq!(p.race_increments, 10_000);
    }

    #[test]
    fn test_workers_override_and_validation() {
        let p = ScenarioParams::from_config(&GilConfig::default(), Some(3), false).unwrap();
        assert_eq!(p.workers, 3);
        assert!(ScenarioParams::from_config(&GilConfig::default(), Some(0), false).is_err());
    }

    #[test]
    fn test_bad_duration_in_config() {
        let mut config = GilConfig::default();
        config.workloads.io_time = "soon".to_string();
        assert!(ScenarioParams::from_config(&config, None, false).is_err());
    }

    #[test]
    fn test_catalogue_shape() {
        let scenarios = catalogue(&params()).unwrap();
        let ids: Vec<_> = scenarios.iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                "cpu-threads",
                "cpu-processes",
                "io-threads",
                "mixed-threads",
                "executors",
                "async-io",
                "async-semaphore",
                "race"
            ]
        );

        for s in &scenarios {
            if let ScenarioKind::Compare { strategies, tasks } = &s.kind {
                assert_eq!(strategies[0], Strategy::Sequential, "{}", s.id);
                assert!(strategies.len() >= 2, "{}", s.id);
                assert!(!tasks.is_empty(), "{}", s.id);
            }
        }

        let executors = &scenarios[4];
        assert_eq!(executors.units(), 4);
        assert!(executors.uses_processes());
        assert!(!scenarios[0].uses_processes());
    }

    #[test]
    fn test_negative_size_rejected() {
        let mut p = params();
        p.cpu_n = -5;
        assert!(catalogue(&p).is_err());
    }

    #[test]
    fn test_all_tags() {
        let tags = all_tags(&catalogue(&params()).unwrap());
        assert_eq!(tags, vec!["async", "cpu", "io", "processes", "race", "threads"]);
    }
}
