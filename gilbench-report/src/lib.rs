#![warn(missing_docs)]
//! gilbench Report - Result Model and Output
//!
//! Holds everything a run produces: per-scenario timings with speedup
//! against the sequential baseline, shared-counter race outcomes, and a
//! summary. Serializes to JSON; the human-readable rendering lives in the
//! CLI.

mod json;
mod report;
mod speedup;

pub use json::{SCHEMA_VERSION, generate_json_report};
pub use report::{
    RaceEntry, RaceReport, Report, ReportConfig, ReportMeta, ReportSummary, RunStatus,
    ScenarioReport, StrategyEntry, SystemInfo,
};
pub use speedup::Speedup;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// JSON with full schema
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" | "text" => Ok(OutputFormat::Human),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
