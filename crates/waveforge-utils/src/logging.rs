//! Logging and observability infrastructure for waveforge
//!
//! Structured logging via `tracing`. Library crates only emit events and open spans;
//! the binary decides how they are rendered through [`init_tracing`].

use std::io::IsTerminal;
use tracing::{Level, error, info, span, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Output options for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFormat {
    /// Debug-level filter, targets and span close events
    pub verbose: bool,
    /// Newline-delimited JSON instead of the compact text format
    pub json: bool,
}

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("waveforge=debug,info")
            } else {
                EnvFilter::try_new("waveforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the verbosity default. Logs go to stderr so
/// `--json` command output on stdout stays machine-readable.
pub fn init_tracing(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = default_filter(format.verbose);

    if format.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else if format.verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Span covering one orchestration run.
pub fn run_span(run_id: &str, session_id: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "orchestration_run",
        run_id = %run_id,
        session_id = %session_id,
    )
}

/// Span covering one wave of concurrently dispatched tasks.
pub fn wave_span(index: usize, size: usize) -> tracing::Span {
    span!(Level::INFO, "wave", index, size)
}

/// Span covering a single delegate invocation.
pub fn delegate_span(task_id: &str, agent: &str) -> tracing::Span {
    span!(
        Level::DEBUG,
        "delegate_task",
        task_id = %task_id,
        agent = %agent,
    )
}

/// Span covering one quality check plus the repairs that follow it.
pub fn quality_round_span(round: u32) -> tracing::Span {
    span!(Level::INFO, "quality_round", round)
}

pub fn log_wave_start(index: usize, task_ids: &[String]) {
    info!(
        wave = index,
        tasks = %task_ids.join(","),
        "Dispatching wave"
    );
}

pub fn log_wave_complete(index: usize, succeeded: usize, failed: usize, duration_ms: u128) {
    if failed == 0 {
        info!(wave = index, succeeded, duration_ms = %duration_ms, "Wave completed");
    } else {
        warn!(
            wave = index,
            succeeded,
            failed,
            duration_ms = %duration_ms,
            "Wave completed with failed tasks"
        );
    }
}

pub fn log_task_error(task_id: &str, agent: &str, error: &str) {
    error!(
        task_id = %task_id,
        agent = %agent,
        error = %error,
        "Delegate task failed"
    );
}
