//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, discovers configuration, sets up tracing and the tokio
//! runtime, dispatches the command, and owns all error output.

use clap::Parser;

use super::args::{BudgetArgs, Cli, Commands};
use super::commands;

use crate::config::{CliArgs, Config};
use crate::utils::error::WaveforgeError;
use crate::utils::logging::{LogFormat, init_tracing};
use crate::utils::ExitCode;

/// Main CLI execution function.
///
/// Returns `Err(ExitCode)` for every non-zero exit, including a failed quality gate;
/// main.rs only maps it to the process exit status and never prints.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let budget = match &cli.command {
        Commands::DryRun { budget, .. } => budget.clone(),
        _ => BudgetArgs::default(),
    };
    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        max_tool_calls: budget.max_tool_calls,
        max_iterations: budget.max_iterations,
        max_duration_ms: budget.max_duration_ms,
        max_repair_rounds: budget.max_repair_rounds,
        max_concurrency: budget.max_concurrency,
        entry: None,
        verbose: cli.verbose.then_some(true),
        log_json: cli.log_json.then_some(true),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("✗ Configuration error: {err:#}");
            return Err(ExitCode::CLI_ARGS);
        }
    };

    if let Err(e) = init_tracing(LogFormat {
        verbose: config.verbose(),
        json: config.log_json(),
    }) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Validate { plan, json } => commands::execute_validate_command(&plan, json),
            Commands::Schedule { plan, json } => commands::execute_schedule_command(&plan, json),
            Commands::Analyze {
                dir,
                routes,
                entry,
                json,
            } => commands::execute_analyze_command(&dir, routes.as_deref(), entry, json, &config),
            Commands::DryRun {
                plan,
                artifacts,
                session,
                gate_report,
                json,
                ..
            } => {
                commands::execute_dry_run_command(
                    &plan,
                    &artifacts,
                    &session,
                    gate_report.as_deref(),
                    json,
                    &config,
                )
                .await
            }
            Commands::Config { json } => commands::execute_config_command(&config, json),
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(error) => {
            if let Some(waveforge_error) = error.downcast_ref::<WaveforgeError>() {
                eprintln!("✗ {}", waveforge_error.display_for_user());
                if error.chain().count() > 1 {
                    eprintln!("  ({error})");
                }
                Err(waveforge_error.to_exit_code())
            } else {
                eprintln!("✗ Unexpected error: {error:#}");
                eprintln!("\n  Run with --verbose for more detailed output");
                Err(ExitCode::INTERNAL)
            }
        }
    }
}
