//! Shared key/value store for run results
//!
//! Task results, patch intents, the gate state and the run outcome are written here so
//! that later consumers (delegates, reporting) can read them by key.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const QUALITY_GATE_KEY: &str = "quality_gate";
pub const RUN_OUTCOME_KEY: &str = "run_outcome";

#[must_use]
pub fn task_result_key(task_id: &str) -> String {
    format!("task_result/{task_id}")
}

#[must_use]
pub fn patch_intents_key(task_id: &str) -> String {
    format!("patch_intents/{task_id}")
}

/// Record id of one repair attempt, used in place of a plan task id.
#[must_use]
pub fn repair_record_id(round: u32, attempt: u32) -> String {
    format!("repair/{round}/{attempt}")
}

pub trait Blackboard: Send + Sync {
    fn write(&self, key: &str, value: Value);

    fn read(&self, key: &str) -> Option<Value>;

    /// All keys, sorted.
    fn keys(&self) -> Vec<String>;
}

/// Serialize `value` and write it under `key`. A value that fails to serialize is
/// logged and skipped.
pub fn write_json<T: Serialize + ?Sized>(board: &dyn Blackboard, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(json) => board.write(key, json),
        Err(e) => warn!(key, error = %e, "Failed to serialize blackboard entry"),
    }
}

/// Process-local blackboard. Later writes to a key replace earlier ones.
#[derive(Debug, Default)]
pub struct InMemoryBlackboard {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryBlackboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Blackboard for InMemoryBlackboard {
    fn write(&self, key: &str, value: Value) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn read(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
