//! Canonical JSON emission for gate results

use anyhow::Context;
use serde::Serialize;
use waveforge_utils::canonicalization::emit_jcs;

use crate::types::{QualityCheckOutcome, QualityGateState};

/// Gate state together with the last quality check that decided it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateReport<'a> {
    pub gate: &'a QualityGateState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<&'a QualityCheckOutcome>,
}

/// Emit a [`GateReport`] as canonical JSON (RFC 8785).
pub fn emit_gate_report_json(
    state: &QualityGateState,
    last_check: Option<&QualityCheckOutcome>,
) -> anyhow::Result<String> {
    emit_jcs(&GateReport {
        gate: state,
        last_check,
    })
    .context("Failed to emit gate report JSON")
}
