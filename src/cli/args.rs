//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// waveforge - wave-scheduled orchestration with a deterministic quality gate
#[derive(Parser, Debug)]
#[command(name = "waveforge")]
#[command(about = "Plan validation, wave scheduling and artifact quality checks for delegated code generation")]
#[command(long_about = r#"
waveforge turns a task plan into waves of independent tasks, runs them through a
delegate, and decides success with a deterministic quality gate over the produced
artifact tree.

EXAMPLES:
  # Check a plan for duplicate ids, dangling dependencies, unknown kinds and cycles
  waveforge validate plan.json

  # Show the waves a plan schedules into
  waveforge schedule plan.json --json

  # Run the artifact quality analyzer over a generated app
  waveforge analyze ./app --routes routes.json

  # Exercise scheduling, budgets and the quality gate without a live delegate
  waveforge dry-run plan.json ./app --max-tool-calls 20

  # Show the effective configuration and where each value came from
  waveforge config

CONFIGURATION:
  Precedence: CLI flags > WAVEFORGE_* environment > config file > defaults
  The config file is discovered by searching upward from CWD for .waveforge/config.toml

EXIT CODES:
  0 success, 1 internal error, 2 bad arguments or config, 3 invalid plan,
  4 quality gate failed, 5 budget exhausted, 130 cancelled
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize and strictly validate a plan
    Validate {
        /// Plan file: a task array or {"id", "tasks"}
        plan: PathBuf,

        /// Output the normalized plan as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the waves a plan schedules into
    Schedule {
        plan: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Run the artifact quality analyzer over a directory
    Analyze {
        /// Artifact root directory
        dir: PathBuf,

        /// Route contract: a JSON array of paths or {"routes": [...]}
        #[arg(long)]
        routes: Option<PathBuf>,

        /// Entry module relative to the artifact root (overrides discovery)
        #[arg(long)]
        entry: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Run a plan end to end with a no-op delegate against an existing artifact tree
    DryRun {
        plan: PathBuf,

        /// Artifact root directory checked by the quality gate
        artifacts: PathBuf,

        /// Session id recorded in the run outcome
        #[arg(long, default_value = "local")]
        session: String,

        #[command(flatten)]
        budget: BudgetArgs,

        /// Also write the gate state and deciding check as canonical JSON to this file
        #[arg(long)]
        gate_report: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with sources
    Config {
        #[arg(long)]
        json: bool,
    },
}

/// Budget and loop overrides for a run.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct BudgetArgs {
    /// Maximum delegate invocations for the run
    #[arg(long)]
    pub max_tool_calls: Option<u32>,

    /// Maximum waves plus quality checks for the run
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Wall-clock ceiling for the run in milliseconds
    #[arg(long)]
    pub max_duration_ms: Option<u64>,

    /// Repair rounds before the gate fails
    #[arg(long)]
    pub max_repair_rounds: Option<u32>,

    /// Concurrent delegate calls within one wave
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

/// Build the clap command, for completions and tests.
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
