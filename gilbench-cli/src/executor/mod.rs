//! Scenario Executor
//!
//! Runs planned scenarios and turns their outcomes into a report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Scenario (from the catalogue, filtered by the planner)
//!       │
//!       ▼
//! ┌─────────────┐
//! │  execution  │  Baseline + candidate runs, races
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  metadata   │  System info, timestamp, config
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Human-readable output
//! └─────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`execution`] - Runner selection, timing, speedup and race entries
//! - [`metadata`] - Report metadata and system information
//! - [`formatting`] - Terminal rendering of a finished report

mod execution;
mod formatting;
mod metadata;

pub use execution::{ExecutionConfig, Executor};
pub use formatting::{format_duration, format_human_output};
pub use metadata::{build_report_meta, system_info};
