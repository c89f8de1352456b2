//! Plan normalization and strict validation
//!
//! The planning step hands back a raw task list. [`normalize_raw_plan`] turns it into an
//! [`ExecutionPlan`] (parsing task kinds and filtering tools), and [`validate_plan`]
//! rejects any structural defect before a single task is dispatched.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use waveforge_utils::error::{DanglingDependency, PlanError, UnknownAgentKind};
use waveforge_utils::types::{AgentKind, ExecutionPlan, ExecutionPlanTask, RawPlanTask};

use crate::scheduler;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPlanDocument {
    Tasks(Vec<RawPlanTask>),
    Wrapped {
        #[serde(default)]
        id: Option<String>,
        tasks: Vec<RawPlanTask>,
    },
}

/// Parse a plan document: either a bare task array or `{"id": ..., "tasks": [...]}`.
///
/// `default_id` names the plan when the document does not.
pub fn parse_plan_json(default_id: &str, json: &str) -> Result<ExecutionPlan, PlanError> {
    let document: RawPlanDocument =
        serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))?;
    let (id, tasks) = match document {
        RawPlanDocument::Tasks(tasks) => (default_id.to_string(), tasks),
        RawPlanDocument::Wrapped { id, tasks } => {
            (id.unwrap_or_else(|| default_id.to_string()), tasks)
        }
    };
    normalize_raw_plan(id, tasks)
}

/// Build an [`ExecutionPlan`] from raw tasks.
///
/// Unknown task kinds are fatal and reported together. Tools outside a kind's allow-list
/// are dropped with a warning; when nothing survives, the kind's default list is used.
pub fn normalize_raw_plan(
    id: impl Into<String>,
    raw: Vec<RawPlanTask>,
) -> Result<ExecutionPlan, PlanError> {
    let mut unknown = Vec::new();
    let mut tasks = Vec::with_capacity(raw.len());

    for task in raw {
        if task.id.trim().is_empty() {
            return Err(PlanError::Malformed("task with empty id".to_string()));
        }
        let Ok(kind) = task.agent_id.parse::<AgentKind>() else {
            unknown.push(UnknownAgentKind {
                task_id: task.id,
                agent_id: task.agent_id,
            });
            continue;
        };

        let (tools, dropped) = kind.filter_tools(&task.tools);
        if !dropped.is_empty() {
            warn!(
                task_id = %task.id,
                agent = %kind,
                dropped = %dropped.join(","),
                "Dropped tools outside the task kind's allow-list"
            );
        }

        tasks.push(ExecutionPlanTask {
            id: task.id,
            agent_id: kind,
            goal: task.goal,
            depends_on: task.depends_on,
            tools,
        });
    }

    if !unknown.is_empty() {
        return Err(PlanError::UnknownAgentKinds { entries: unknown });
    }

    let plan = ExecutionPlan::new(id, tasks);
    debug!(plan_id = %plan.id, tasks = plan.tasks.len(), "Normalized raw plan");
    Ok(plan)
}

/// Strict structural validation: unique ids, every dependency resolvable, no cycles.
///
/// Each check lists every offending id, not only the first.
pub fn validate_plan(tasks: &[ExecutionPlanTask]) -> Result<(), PlanError> {
    let mut seen = HashSet::new();
    let duplicates: BTreeSet<String> = tasks
        .iter()
        .filter(|t| !seen.insert(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();
    if !duplicates.is_empty() {
        return Err(PlanError::DuplicateTaskIds {
            ids: duplicates.into_iter().collect(),
        });
    }

    let ids: HashMap<&str, &ExecutionPlanTask> =
        tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let dangling: Vec<DanglingDependency> = tasks
        .iter()
        .flat_map(|t| {
            t.depends_on
                .iter()
                .filter(|dep| !ids.contains_key(dep.as_str()))
                .map(|dep| DanglingDependency {
                    task_id: t.id.clone(),
                    missing: dep.clone(),
                })
        })
        .collect();
    if !dangling.is_empty() {
        return Err(PlanError::DanglingDependencies { refs: dangling });
    }

    scheduler::compute_waves(tasks).map(|_| ())
}
