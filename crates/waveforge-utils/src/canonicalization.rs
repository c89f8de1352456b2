//! Deterministic JSON output and content fingerprints

use anyhow::{Context, Result};
use serde::Serialize;

use crate::types::ExecutionPlanTask;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// Used for every machine-readable output (gate results, run outcomes, wave
/// schedules) so key order never depends on struct layout.
///
/// ```rust
/// use waveforge_utils::canonicalization::emit_jcs;
///
/// let json = emit_jcs(&serde_json::json!({"b": 1, "a": 2})).unwrap();
/// assert_eq!(json, r#"{"a":2,"b":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// BLAKE3 fingerprint of a task list.
///
/// Tasks are canonicalized first, so two plans with the same tasks in the same
/// order hash identically regardless of how they were serialized upstream.
pub fn plan_fingerprint(tasks: &[ExecutionPlanTask]) -> Result<String> {
    let canonical = emit_jcs(&tasks)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}
