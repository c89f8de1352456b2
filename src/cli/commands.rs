//! Command implementations
//!
//! Each command returns the exit code it wants on success paths (a failed quality
//! gate is not an error). Errors are `anyhow` wrappers around [`WaveforgeError`] so
//! `run` can map them to exit codes.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analyzer::{AnalyzerOptions, ArtifactAnalyzer, RouteContract};
use crate::config::Config;
use crate::delegate::DryRunDelegate;
use crate::gate::emit_gate_report_json;
use crate::orchestrator::artifacts::read_tree;
use crate::orchestrator::{
    FsArtifactStore, RunController, RunOutcome, RunSettings, compute_waves, parse_plan_json,
    validate_plan, wave_ids,
};
use crate::utils::canonicalization::{emit_jcs, plan_fingerprint};
use crate::utils::error::{ConfigError, WaveforgeError};
use crate::utils::types::ExecutionPlan;
use crate::utils::ExitCode;

/// Read and normalize a plan file; the file stem names plans that carry no id.
pub fn load_plan(path: &Path) -> Result<ExecutionPlan> {
    let json = std::fs::read_to_string(path)
        .map_err(WaveforgeError::from)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let default_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("plan");
    parse_plan_json(default_id, &json).map_err(|e| WaveforgeError::Plan(e).into())
}

pub fn execute_validate_command(plan_path: &Path, json: bool) -> Result<ExitCode> {
    let plan = load_plan(plan_path)?;
    validate_plan(&plan.tasks).map_err(WaveforgeError::Plan)?;

    if json {
        println!("{}", emit_jcs(&plan).context("Failed to emit plan JSON")?);
    } else {
        let waves = compute_waves(&plan.tasks).map_err(WaveforgeError::Plan)?;
        let fingerprint = plan_fingerprint(&plan.tasks)?;
        println!(
            "✓ Plan '{}' is valid: {} task(s) in {} wave(s)",
            plan.id,
            plan.tasks.len(),
            waves.len()
        );
        println!("  fingerprint: {fingerprint}");
    }
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleOutput {
    plan_id: String,
    waves: Vec<Vec<String>>,
}

pub fn execute_schedule_command(plan_path: &Path, json: bool) -> Result<ExitCode> {
    let plan = load_plan(plan_path)?;
    // Dangling references count as satisfied here; `validate` is the strict check
    if let Err(e) = validate_plan(&plan.tasks) {
        warn!(plan_id = %plan.id, error = %e, "Scheduling a plan that fails validation");
    }
    let waves = wave_ids(&compute_waves(&plan.tasks).map_err(WaveforgeError::Plan)?);

    if json {
        let output = ScheduleOutput {
            plan_id: plan.id,
            waves,
        };
        println!("{}", emit_jcs(&output).context("Failed to emit schedule JSON")?);
    } else {
        println!("Plan '{}': {} wave(s)", plan.id, waves.len());
        for (index, wave) in waves.iter().enumerate() {
            println!("  wave {index}: {}", wave.join(", "));
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn execute_analyze_command(
    dir: &Path,
    routes: Option<&Path>,
    entry: Option<String>,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let route_contract = routes.map(load_route_contract).transpose()?;
    let options = AnalyzerOptions {
        entry: entry.or_else(|| config.analyzer.entry.clone()),
        route_contract,
        extra_generic_routes: config.analyzer.extra_generic_routes.clone(),
    };

    let files = read_tree(dir).map_err(WaveforgeError::from)?;
    info!(dir = %dir.display(), files = files.len(), "Analyzing artifact tree");
    let report = ArtifactAnalyzer::new(options).analyze(&files);

    if json {
        println!("{}", emit_jcs(&report).context("Failed to emit analysis JSON")?);
    } else if report.is_clean() {
        println!(
            "✓ No issues in {} (entry: {}, {} reachable file(s))",
            dir.display(),
            report.entry.as_deref().unwrap_or("-"),
            report.reachable_files.len()
        );
    } else {
        println!("✗ {} issue(s) in {}", report.issues.len(), dir.display());
        for issue in &report.issues {
            println!("  {issue}");
        }
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::QUALITY_GATE_FAILED
    })
}

fn load_route_contract(path: &Path) -> Result<RouteContract> {
    let json = std::fs::read_to_string(path)
        .map_err(WaveforgeError::from)
        .with_context(|| format!("Failed to read route contract {}", path.display()))?;
    RouteContract::from_json(&json).map_err(|e| {
        WaveforgeError::Config(ConfigError::InvalidValue {
            key: "routes".to_string(),
            value: format!("{}: {e}", path.display()),
        })
        .into()
    })
}

pub async fn execute_dry_run_command(
    plan_path: &Path,
    artifacts: &Path,
    session: &str,
    gate_report: Option<&Path>,
    json: bool,
    config: &Config,
) -> Result<ExitCode> {
    let plan = load_plan(plan_path)?;
    let mut controller = RunController::new(
        Arc::new(DryRunDelegate::new(config.pass_token())),
        Arc::new(FsArtifactStore::new(artifacts)),
        RunSettings::from_config(config),
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };
    let outcome = controller.run(&plan, session, cancel).await;
    interrupt.abort();
    let outcome = outcome.map_err(WaveforgeError::Plan)?;

    if let Some(path) = gate_report {
        let report = emit_gate_report_json(&outcome.quality_gate, outcome.quality_check.as_ref())?;
        std::fs::write(path, report)
            .map_err(WaveforgeError::from)
            .with_context(|| format!("Failed to write gate report {}", path.display()))?;
        info!(path = %path.display(), "Wrote gate report");
    }

    if json {
        println!("{}", emit_jcs(&outcome).context("Failed to emit run outcome JSON")?);
    } else {
        print_outcome(&outcome);
    }
    Ok(outcome.exit_code())
}

fn print_outcome(outcome: &RunOutcome) {
    let mark = if outcome.success { "✓" } else { "✗" };
    println!(
        "{mark} Run {} (session {}): {:?}",
        outcome.run_id, outcome.session_id, outcome.stop_reason
    );
    println!(
        "  waves executed: {}, delegate invocations: {}",
        outcome.waves_executed, outcome.delegate_invocations
    );
    println!(
        "  quality gate [{}]: {}",
        outcome.quality_gate.gate, outcome.quality_gate.status
    );
    for line in outcome.quality_gate.summary.lines() {
        println!("    {line}");
    }
    if !outcome.degraded_task_ids.is_empty() {
        println!("  degraded tasks: {}", outcome.degraded_task_ids.join(", "));
    }
    if !outcome.skipped_task_ids.is_empty() {
        println!("  skipped tasks: {}", outcome.skipped_task_ids.join(", "));
    }
    if let Some(limit) = outcome.budget_stop_reason {
        println!("  budget stop reason: {limit}");
    }
}

#[derive(Serialize)]
struct ConfigEntry {
    value: String,
    source: String,
}

pub fn execute_config_command(config: &Config, json: bool) -> Result<ExitCode> {
    let effective = config.effective_config();
    if json {
        let entries: BTreeMap<String, ConfigEntry> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigEntry { value, source }))
            .collect();
        println!("{}", emit_jcs(&entries).context("Failed to emit config JSON")?);
    } else {
        println!("Effective configuration:");
        for (key, (value, source)) in &effective {
            println!("  {key} = {value}  ({source})");
        }
    }
    Ok(ExitCode::SUCCESS)
}
