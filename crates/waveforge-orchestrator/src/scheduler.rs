//! Wave scheduler
//!
//! Kahn's algorithm, processed level by level: every wave is the whole zero-in-degree
//! frontier, so tasks inside one wave never depend on each other and every dependency
//! lands in a strictly earlier wave.
//!
//! The scheduler is lenient about dependencies on ids that are not in the task list;
//! they count as already satisfied. Rejecting those is the job of
//! [`crate::plan::validate_plan`].

use std::collections::HashMap;
use tracing::trace;

use waveforge_utils::error::PlanError;
use waveforge_utils::types::ExecutionPlanTask;

/// Tasks that may run concurrently. Members keep their plan order.
pub type Wave = Vec<ExecutionPlanTask>;

/// Group tasks into waves.
///
/// Returns [`PlanError::Cycle`] listing every task whose in-degree never reached zero
/// (cycle members and everything downstream of them), in plan order. A task that only
/// depends on itself is a one-task cycle.
pub fn compute_waves(tasks: &[ExecutionPlanTask]) -> Result<Vec<Wave>, PlanError> {
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, task) in tasks.iter().enumerate() {
        positions.entry(task.id.as_str()).or_default().push(idx);
    }

    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (idx, task) in tasks.iter().enumerate() {
        for dep in &task.depends_on {
            // Dangling references contribute no in-degree
            let Some(sources) = positions.get(dep.as_str()) else {
                trace!(task_id = %task.id, missing = %dep, "Ignoring dependency on unknown task");
                continue;
            };
            for &source in sources {
                in_degree[idx] += 1;
                dependents[source].push(idx);
            }
        }
    }

    let mut frontier: Vec<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut waves = Vec::new();
    let mut processed = 0;

    while !frontier.is_empty() {
        processed += frontier.len();
        let mut next = Vec::new();
        for &idx in &frontier {
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        waves.push(frontier.iter().map(|&i| tasks[i].clone()).collect());
        frontier = next;
    }

    if processed < tasks.len() {
        let task_ids = (0..tasks.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| tasks[i].id.clone())
            .collect();
        return Err(PlanError::Cycle { task_ids });
    }

    Ok(waves)
}

/// Task ids per wave, for display and logging.
#[must_use]
pub fn wave_ids(waves: &[Wave]) -> Vec<Vec<String>> {
    waves
        .iter()
        .map(|wave| wave.iter().map(|t| t.id.clone()).collect())
        .collect()
}
