//! Configuration loading from gilbench.toml
//!
//! Workload sizes, pool sizes and output defaults can be specified in a
//! `gilbench.toml` file. The configuration is discovered by walking up from
//! the current directory; every field has a default.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name looked up by [`GilConfig::discover`]
pub const CONFIG_FILE: &str = "gilbench.toml";

/// gilbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GilConfig {
    /// Workload sizes
    #[serde(default)]
    pub workloads: WorkloadConfig,
    /// Pool sizes
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Shared-counter race parameters
    #[serde(default)]
    pub race: RaceConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Workload sizes used by the scenario catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Sum-of-squares bound for the CPU-bound scenarios
    #[serde(default = "default_cpu_n")]
    pub cpu_n: i64,
    /// Wait for the I/O-bound scenarios (e.g., "1s")
    #[serde(default = "default_io_time")]
    pub io_time: String,
    /// CPU part of the mixed workload
    #[serde(default = "default_mixed_n")]
    pub mixed_n: i64,
    /// I/O part of the mixed workload
    #[serde(default = "default_mixed_io_time")]
    pub mixed_io_time: String,
    /// Sum-of-squares bound for the executor comparison
    #[serde(default = "default_executor_n")]
    pub executor_n: i64,
    /// Wait per task in the semaphore scenario
    #[serde(default = "default_semaphore_io_time")]
    pub semaphore_io_time: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            cpu_n: default_cpu_n(),
            io_time: default_io_time(),
            mixed_n: default_mixed_n(),
            mixed_io_time: default_mixed_io_time(),
            executor_n: default_executor_n(),
            semaphore_io_time: default_semaphore_io_time(),
        }
    }
}

fn default_cpu_n() -> i64 {
    50_000_000
}
fn default_io_time() -> String {
    "1s".to_string()
}
fn default_mixed_n() -> i64 {
    10_000_000
}
fn default_mixed_io_time() -> String {
    "500ms".to_string()
}
fn default_executor_n() -> i64 {
    20_000_000
}
fn default_semaphore_io_time() -> String {
    "500ms".to_string()
}

/// Pool sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Workers for the two-way thread / process scenarios
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Workers for the executor comparison
    #[serde(default = "default_executor_workers")]
    pub executor_workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            executor_workers: default_executor_workers(),
        }
    }
}

fn default_workers() -> usize {
    2
}
fn default_executor_workers() -> usize {
    4
}

/// Shared-counter race parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Concurrent threads
    #[serde(default = "default_race_threads")]
    pub threads: usize,
    /// Increments per thread
    #[serde(default = "default_race_increments")]
    pub increments: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            threads: default_race_threads(),
            increments: default_race_increments(),
        }
    }
}

fn default_race_threads() -> usize {
    5
}
fn default_race_increments() -> u64 {
    100_000
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human" or "json"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}

impl GilConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => {
                        tracing::debug!(path = %config_path.display(), "loaded configuration");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %config_path.display(),
                            "ignoring configuration: {e}"
                        );
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# gilbench configuration

[workloads]
# Sum-of-squares bound for the CPU-bound scenarios
cpu_n = 50000000
# Wait per task for the I/O-bound scenarios
io_time = "1s"
# Mixed workload: CPU part, then I/O part
mixed_n = 10000000
mixed_io_time = "500ms"
# Sum-of-squares bound for the executor comparison
executor_n = 20000000
# Wait per task in the semaphore scenario
semaphore_io_time = "500ms"

[runner]
# Workers for the two-way thread / process scenarios
workers = 2
# Workers for the executor comparison
executor_workers = 4

[race]
# Threads incrementing the shared counter
threads = 5
# Increments per thread
increments = 100000

[output]
# Default output format: human, json
format = "human"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Duration must be a non-negative number: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }

    /// Parse a duration string into a [`Duration`]
    pub fn duration(s: &str) -> anyhow::Result<Duration> {
        Self::parse_duration(s).map(Duration::from_nanos)
    }
}
