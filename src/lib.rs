//! waveforge: wave-scheduled orchestration of code-generation delegates with a
//! deterministic quality gate.
//!
//! The workspace crates are re-exported under short module names:
//!
//! - [`utils`]: plan/task data model, errors, exit codes, canonical JSON, tracing
//! - [`config`]: layered configuration
//! - [`delegate`]: the delegate contract, budget tracking and verdict parsing
//! - [`analyzer`]: the artifact quality analyzer
//! - [`gate`]: quality gate state and summaries
//! - [`orchestrator`]: scheduler, wave executor, quality/repair loop, run controller

pub mod cli;

pub use waveforge_analyzer as analyzer;
pub use waveforge_config as config;
pub use waveforge_delegate as delegate;
pub use waveforge_gate as gate;
pub use waveforge_orchestrator as orchestrator;
pub use waveforge_utils as utils;

pub use waveforge_orchestrator::{RunController, RunOutcome, RunSettings, StopReason};
pub use waveforge_utils::{ExitCode, WaveforgeError};
pub use waveforge_utils::canonicalization::emit_jcs;
