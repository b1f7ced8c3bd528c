//! Output Formatting
//!
//! Human-readable output formatting for run reports.
//!
//! Generates terminal-friendly output with:
//! - A system header (CPU model and core count matter for every number)
//! - One section per scenario: elapsed time, speedup against the baseline,
//!   status icon (✓/✗) and an outputs-match marker
//! - The expected-outcome note for each scenario
//! - A table for each shared-counter race
//! - A summary

use gilbench_report::{RaceReport, Report, RunStatus, ScenarioReport, StrategyEntry};
use std::time::Duration;

/// Format a duration with a unit that keeps 3-4 significant digits
pub fn format_duration(d: Duration) -> String {
    let ns = d.as_nanos();
    if ns >= 1_000_000_000 {
        format!("{:.3} s", d.as_secs_f64())
    } else if ns >= 1_000_000 {
        format!("{:.2} ms", d.as_secs_f64() * 1e3)
    } else if ns >= 1_000 {
        format!("{:.2} µs", d.as_secs_f64() * 1e6)
    } else {
        format!("{} ns", ns)
    }
}

/// Format a report for human-readable terminal display
pub fn format_human_output(report: &Report) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("gilbench Results\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');
    let system = &report.meta.system;
    output.push_str(&format!(
        "System: {} {}, {}, {} core(s){}\n\n",
        system.os,
        system.arch,
        system.cpu,
        system.cpu_cores,
        if report.meta.config.quick {
            "  [quick]"
        } else {
            ""
        }
    ));

    for scenario in &report.scenarios {
        format_scenario(&mut output, scenario);
    }

    for race in &report.races {
        format_race(&mut output, race);
    }

    // Summary
    let summary = &report.summary;
    output.push_str("Summary\n");
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "  Scenarios: {}  Runs: {}  Completed: {}  Failed: {}\n",
        summary.total_scenarios, summary.total_runs, summary.completed, summary.failed
    ));
    if summary.diverged > 0 {
        output.push_str(&format!(
            "  Outputs differing from baseline: {}\n",
            summary.diverged
        ));
    }
    if summary.lost_updates > 0 {
        output.push_str(&format!(
            "  Increments lost without a lock: {}\n",
            summary.lost_updates
        ));
    }
    if summary.race_violations > 0 {
        output.push_str(&format!(
            "  Locked counters that lost increments: {}\n",
            summary.race_violations
        ));
    }
    output.push_str(&format!("  Duration: {:.2} ms\n", summary.total_duration_ms));

    output
}

fn format_scenario(output: &mut String, scenario: &ScenarioReport) {
    output.push_str(&format!(
        "{}: {} ({} task(s))\n",
        scenario.id, scenario.title, scenario.units
    ));
    output.push_str(&"-".repeat(60));
    output.push('\n');

    let width = scenario
        .entries
        .iter()
        .map(|e| e.strategy.len())
        .max()
        .unwrap_or(10);

    if let Some(baseline) = scenario.baseline() {
        format_entry(output, baseline, "baseline".to_string(), width);
    }
    for entry in scenario.candidates() {
        let speedup = entry
            .speedup
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        format_entry(output, entry, speedup, width);
    }

    if !scenario.note.is_empty() {
        output.push_str(&format!("  note: {}\n", scenario.note));
    }
    output.push('\n');
}

fn format_entry(output: &mut String, entry: &StrategyEntry, speedup: String, width: usize) {
    let icon = match entry.status {
        RunStatus::Completed => "✓",
        RunStatus::Failed { .. } => "✗",
    };
    let marker = match entry.outputs_match {
        Some(true) => "  outputs match",
        Some(false) => "  OUTPUTS DIFFER",
        None => "",
    };

    output.push_str(&format!(
        "  {} {:<width$}  {:>12}  {:>9}{}\n",
        icon,
        entry.strategy,
        format_duration(entry.elapsed()),
        speedup,
        marker,
        width = width
    ));

    if let RunStatus::Failed { message } = &entry.status {
        output.push_str(&format!("      error: {}\n", message));
    }
}

fn format_race(output: &mut String, race: &RaceReport) {
    output.push_str(&format!(
        "{}: {} ({} threads x {} increments)\n",
        race.id, race.title, race.threads, race.increments
    ));
    output.push_str(&"-".repeat(60));
    output.push('\n');
    output.push_str(&format!(
        "    {:<8}  {:>12}  {:>12}  {:>10}  {:>10}\n",
        "counter", "expected", "actual", "lost", "time"
    ));

    for entry in &race.entries {
        let icon = if entry.is_violation() { "✗" } else { "✓" };
        output.push_str(&format!(
            "  {} {:<8}  {:>12}  {:>12}  {:>10}  {:>10}\n",
            icon,
            entry.counter,
            entry.expected,
            entry.actual,
            entry.lost,
            format_duration(Duration::from_nanos(entry.elapsed_ns))
        ));
    }

    if !race.note.is_empty() {
        output.push_str(&format!("  note: {}\n", race.note));
    }
    output.push('\n');
}
