#![warn(missing_docs)]
//! gilbench CLI Library
//!
//! Command-line harness for the gilbench scenarios. `gilbench::run()` (or
//! `gilbench_cli::run()`) parses arguments, runs the selected scenarios and
//! prints a report. The same binary doubles as the process-pool worker when
//! started with the hidden worker flag.
//!
//! # Example
//!
//! ```ignore
//! fn main() -> anyhow::Result<()> {
//!     gilbench_cli::run()
//! }
//! ```

mod config;
mod executor;
mod planner;
mod scenario;
mod supervisor;

pub use config::*;
pub use executor::{
    ExecutionConfig, Executor, build_report_meta, format_duration, format_human_output,
    system_info,
};
pub use planner::{ExecutionPlan, build_plan};
pub use scenario::{Scenario, ScenarioKind, ScenarioParams, all_tags, catalogue};
pub use supervisor::*;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gilbench_core::WorkerMain;
use gilbench_report::{OutputFormat, Report, ReportConfig, ReportSummary, generate_json_report};
use regex::Regex;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Instant;

/// gilbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "gilbench")]
#[command(
    author,
    version,
    about = "gilbench - sequential vs threads vs processes vs coroutines"
)]
pub struct Cli {
    /// Optional subcommand (List, Run, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter scenarios by regex pattern on their ID
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Output format: human or json (defaults to gilbench.toml, then human)
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run scenarios with this tag only
    #[arg(long)]
    pub tag: Option<String>,

    /// Skip scenarios with this tag
    #[arg(long)]
    pub skip_tag: Option<String>,

    /// Workers for the threads/processes scenarios (overrides gilbench.toml)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Scale every workload down for a fast smoke run
    #[arg(long)]
    pub quick: bool,

    /// Dry run - list scenarios without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the process pool)
    #[arg(long, hide = true)]
    pub gil_worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the scenarios that would run
    List,
    /// Run scenarios (default)
    Run,
    /// Print a default gilbench.toml
    Init,
}

/// Run the gilbench CLI with the process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the gilbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode first: stdout and stderr belong to the parent
    if cli.gil_worker {
        return run_worker_mode();
    }

    let filter = if cli.verbose {
        "gilbench=debug"
    } else {
        "gilbench=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = GilConfig::discover().unwrap_or_default();

    match cli.command {
        Some(Commands::List) => list_scenarios(&cli, &config),
        Some(Commands::Init) => {
            print!("{}", GilConfig::default_toml());
            Ok(())
        }
        Some(Commands::Run) => run_scenarios(&cli, &config),
        None => {
            if cli.dry_run {
                list_scenarios(&cli, &config)
            } else {
                run_scenarios(&cli, &config)
            }
        }
    }
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gilbench=warn")
        .with_writer(std::io::stderr)
        .try_init();

    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Resolved sizes, the filtered plan and the full catalogue
struct Selection {
    params: ScenarioParams,
    plan: ExecutionPlan,
    all: Vec<Scenario>,
}

/// Resolve sizes and build the filtered plan.
fn plan_scenarios(cli: &Cli, config: &GilConfig) -> anyhow::Result<Selection> {
    let params = ScenarioParams::from_config(config, cli.workers, cli.quick)?;
    let all = catalogue(&params)?;
    let filter_re = Regex::new(&cli.filter)
        .with_context(|| format!("invalid filter pattern '{}'", cli.filter))?;

    let plan = build_plan(
        all.iter().cloned(),
        Some(&filter_re),
        cli.tag.as_deref(),
        cli.skip_tag.as_deref(),
    );
    Ok(Selection { params, plan, all })
}

fn list_scenarios(cli: &Cli, config: &GilConfig) -> anyhow::Result<()> {
    let Selection { plan, all, .. } = plan_scenarios(cli, config)?;

    println!("gilbench Plan:");
    for scenario in &plan.scenarios {
        let tags = if scenario.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", scenario.tags.join(", "))
        };
        let strategies = match &scenario.kind {
            ScenarioKind::Compare { strategies, .. } => strategies
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" vs "),
            ScenarioKind::Race {
                threads,
                increments,
            } => format!("{} threads x {} increments", threads, increments),
        };
        println!("├── {}{}: {}", scenario.id, tags, strategies);
    }
    println!("{} scenarios selected.", plan.scenarios.len());

    // Tags across the whole catalogue, so users can discover what to filter by
    println!("Tags: {}", all_tags(&all).join(", "));
    Ok(())
}

fn run_scenarios(cli: &Cli, config: &GilConfig) -> anyhow::Result<()> {
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(anyhow::Error::msg)?;

    let Selection { params, plan, all } = plan_scenarios(cli, config)?;
    if plan.scenarios.is_empty() {
        if let Some(ref tag) = cli.tag {
            let available = all_tags(&all);
            if !available.contains(&tag.as_str()) {
                eprintln!(
                    "Warning: tag '{}' not found. Available tags: {}",
                    tag,
                    available.join(", ")
                );
            }
        }
        println!("No scenarios found.");
        return Ok(());
    }

    let cores = gilbench_core::available_cores();
    if plan.uses_processes() && cores < 2 {
        tracing::warn!(cores, "process pools cannot run in parallel on this machine");
    }

    eprintln!(
        "Running {} scenarios, {} worker(s), {} executor worker(s){}...\n",
        plan.scenarios.len(),
        params.workers,
        params.executor_workers,
        if cli.quick { " (quick)" } else { "" }
    );

    let start_time = Instant::now();
    let executor = Executor::new(ExecutionConfig {
        worker_binary: None,
        show_progress: !cli.verbose && std::io::stderr().is_terminal(),
    });
    let (scenarios, races) = executor.execute(&plan);

    let summary = ReportSummary::compute(&scenarios, &races, start_time.elapsed());
    let report = Report {
        meta: build_report_meta(ReportConfig {
            workers: params.workers,
            executor_workers: params.executor_workers,
            quick: cli.quick,
        }),
        scenarios,
        races,
        summary,
    };

    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };

    if let Some(ref path) = cli.output {
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        file.write_all(output.as_bytes())?;
        eprintln!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    let summary = &report.summary;
    if !summary.is_success() {
        if summary.failed > 0 {
            eprintln!("\n{} run(s) failed", summary.failed);
        }
        if summary.diverged > 0 {
            eprintln!("\n{} run(s) produced different outputs", summary.diverged);
        }
        if summary.race_violations > 0 {
            eprintln!("\nlocked counter lost increments");
        }
        std::process::exit(1);
    }

    Ok(())
}
