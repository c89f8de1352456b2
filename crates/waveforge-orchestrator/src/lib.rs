//! Orchestration core for waveforge runs
//!
//! Turns an [`ExecutionPlan`] into ordered waves, dispatches each wave's tasks to a
//! delegate concurrently, then drives the quality/repair loop until the quality gate
//! passes, the repair rounds run out, the budget is exhausted or the run is cancelled.
//!
//! # Module Organization
//!
//! - `plan.rs`: raw plan normalization and strict validation
//! - `scheduler.rs`: lenient Kahn leveling into waves
//! - `executor.rs`: concurrent wave execution with failure isolation
//! - `repair.rs`: the bounded quality/repair loop
//! - `controller.rs`: the run controller and [`RunOutcome`]
//! - `events.rs`, `blackboard.rs`, `artifacts.rs`: collaborator seams
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use waveforge_delegate::DryRunDelegate;
//! use waveforge_orchestrator::{FsArtifactStore, RunController, RunSettings, parse_plan_json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plan = parse_plan_json("plan", &std::fs::read_to_string("plan.json")?)?;
//!     let mut controller = RunController::new(
//!         Arc::new(DryRunDelegate::new("QUALITY_PASSED")),
//!         Arc::new(FsArtifactStore::new("app")),
//!         RunSettings::default(),
//!     );
//!     let outcome = controller.run(&plan, "local", CancellationToken::new()).await?;
//!     println!("success: {}", outcome.success);
//!     Ok(())
//! }
//! ```
//!
//! [`ExecutionPlan`]: waveforge_utils::types::ExecutionPlan

pub mod artifacts;
pub mod blackboard;
pub mod controller;
pub mod events;
pub mod executor;
pub mod plan;
pub mod repair;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use artifacts::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore};
pub use blackboard::{Blackboard, InMemoryBlackboard};
pub use controller::{RunController, RunOutcome, RunSettings, StopReason};
pub use events::{
    ChannelEventSink, CollectingEventSink, EventSink, NullEventSink, OrchestrationEvent,
    TracingEventSink,
};
pub use executor::{RunContext, WaveExecutor, WaveReport};
pub use plan::{normalize_raw_plan, parse_plan_json, validate_plan};
pub use repair::{LoopOutcome, LoopStop, QualityLoop, QualityLoopSettings};
pub use scheduler::{Wave, compute_waves, wave_ids};
