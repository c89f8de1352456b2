//! Quality gate state and reporting for waveforge

pub mod json;
pub mod summary;
pub mod types;

// Re-exports for convenience
pub use json::{GateReport, emit_gate_report_json};
pub use types::{GateStatus, QualityCheckOutcome, QualityGateState};
