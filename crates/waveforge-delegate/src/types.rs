//! Core types for the delegate abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use waveforge_utils::error::DelegateError;
use waveforge_utils::types::{ExecutionPlanTask, PatchIntent, TaskResult};

/// Why a delegate is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationPurpose {
    /// A plan task dispatched by the wave executor
    Task,
    /// A quality check inside the quality/repair loop
    Quality,
    /// A repair attempt inside the quality/repair loop
    Repair,
}

/// Per-invocation context handed to a delegate.
#[derive(Debug, Clone)]
pub struct DelegateContext {
    pub session_id: String,
    pub run_id: String,
    pub purpose: InvocationPurpose,
    /// What the delegate should do; the task goal or a quality/repair instruction
    pub instruction: String,
    /// Unresolved issues from the latest quality check (repair invocations only)
    pub issues: Vec<String>,
    /// Quality/repair round, zero-based
    pub round: Option<u32>,
    /// Cancellation signal for the whole run. Delegates are expected to observe it.
    pub cancel: CancellationToken,
}

impl DelegateContext {
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        run_id: impl Into<String>,
        purpose: InvocationPurpose,
        instruction: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            run_id: run_id.into(),
            purpose,
            instruction: instruction.into(),
            issues: Vec::new(),
            round: None,
            cancel,
        }
    }

    #[must_use]
    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    #[must_use]
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }
}

/// What a delegate reports back for one invocation.
///
/// `success` and `patch_intents` are trusted as-is by the wave executor; the free-text
/// response is only parsed for a verdict token during quality checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateOutput {
    pub success: bool,
    #[serde(default)]
    pub patch_intents: Vec<PatchIntent>,
    #[serde(default)]
    pub touched_files: Vec<String>,
    #[serde(default)]
    pub response_text: Option<String>,
}

impl DelegateOutput {
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A non-mutating, unsuccessful outcome that is not an error.
    #[must_use]
    pub fn unsuccessful() -> Self {
        Self::default()
    }

    /// Add a patch intent; its path is also recorded as touched.
    #[must_use]
    pub fn with_patch(mut self, patch: PatchIntent) -> Self {
        if !self.touched_files.contains(&patch.file_path) {
            self.touched_files.push(patch.file_path.clone());
        }
        self.patch_intents.push(patch);
        self
    }

    #[must_use]
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.response_text = Some(text.into());
        self
    }

    /// Attach the output to the task it came from.
    #[must_use]
    pub fn into_task_result(self, task: &ExecutionPlanTask) -> TaskResult {
        TaskResult {
            task_id: task.id.clone(),
            agent_id: task.agent_id,
            success: self.success,
            patch_intents: self.patch_intents,
            touched_files: self.touched_files,
            error: None,
            response_text: self.response_text,
        }
    }
}

/// A worker that carries out one task, quality check or repair.
///
/// Implementations may fail; the orchestrator converts every error into a failed
/// [`TaskResult`] and never lets it escape the run.
#[async_trait]
pub trait DelegateExecutor: Send + Sync {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError>;
}

#[async_trait]
impl<T: DelegateExecutor + ?Sized> DelegateExecutor for Arc<T> {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        (**self).execute(task, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waveforge_utils::types::AgentKind;

    #[test]
    fn test_with_patch_records_touched_file_once() {
        let output = DelegateOutput::succeeded()
            .with_patch(PatchIntent::new("src/App.tsx", "a"))
            .with_patch(PatchIntent::new("src/App.tsx", "b"));
        assert_eq!(output.patch_intents.len(), 2);
        assert_eq!(output.touched_files, vec!["src/App.tsx".to_string()]);
    }

    #[test]
    fn test_into_task_result_carries_task_identity() {
        let task = ExecutionPlanTask::new("page-home", AgentKind::Page, "home");
        let result = DelegateOutput::succeeded()
            .with_response("done")
            .into_task_result(&task);
        assert_eq!(result.task_id, "page-home");
        assert_eq!(result.agent_id, AgentKind::Page);
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.response_text.as_deref(), Some("done"));
    }

    #[test]
    fn test_unsuccessful_output_is_not_an_error() {
        let task = ExecutionPlanTask::new("style", AgentKind::Style, "tokens");
        let result = DelegateOutput::unsuccessful().into_task_result(&task);
        assert!(!result.success);
        assert!(result.error.is_none());
    }
}
