//! System Metadata Collection
//!
//! Speedups only mean something next to the machine that produced them, so
//! every report records:
//!
//! - **OS**: Operating system name and architecture
//! - **CPU**: Model name and logical core count
//! - **Timestamp**: UTC time of report generation
//!
//! The CPU model is read from `/proc/cpuinfo` and degrades to "Unknown" on
//! other platforms.

use chrono::Utc;
use gilbench_report::{ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};

/// Build report metadata including system info
pub fn build_report_meta(config: ReportConfig) -> ReportMeta {
    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: system_info(),
        config,
    }
}

/// Describe the machine we are running on
pub fn system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpu: cpu_model().unwrap_or_else(|| "Unknown".to_string()),
        cpu_cores: gilbench_core::available_cores() as u32,
    }
}

/// CPU model from `/proc/cpuinfo`; `None` elsewhere
#[cfg(target_os = "linux")]
fn cpu_model() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

#[cfg(not(target_os = "linux"))]
fn cpu_model() -> Option<String> {
    None
}
