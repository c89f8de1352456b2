use async_trait::async_trait;
use tracing::info;

use crate::types::{DelegateContext, DelegateExecutor, DelegateOutput, InvocationPurpose};
use waveforge_utils::error::DelegateError;
use waveforge_utils::types::ExecutionPlanTask;

/// Delegate that performs no work.
///
/// Build and repair invocations succeed without patches; quality checks answer with the
/// pass token, so the gate outcome is decided by the analyzer alone. Used by
/// `waveforge dry-run` to exercise scheduling, budgets and the quality gate against an
/// existing artifact tree.
#[derive(Debug, Clone)]
pub struct DryRunDelegate {
    pass_token: String,
}

impl DryRunDelegate {
    #[must_use]
    pub fn new(pass_token: impl Into<String>) -> Self {
        Self {
            pass_token: pass_token.into(),
        }
    }
}

#[async_trait]
impl DelegateExecutor for DryRunDelegate {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        if ctx.cancel.is_cancelled() {
            return Err(DelegateError::Cancelled);
        }
        info!(task_id = %task.id, agent = %task.agent_id, purpose = ?ctx.purpose, "Dry run");
        let output = match ctx.purpose {
            InvocationPurpose::Quality => {
                DelegateOutput::succeeded().with_response(self.pass_token.clone())
            }
            InvocationPurpose::Task | InvocationPurpose::Repair => {
                DelegateOutput::succeeded().with_response(format!("dry run: {}", task.id))
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;
    use waveforge_utils::types::AgentKind;

    #[tokio::test]
    async fn test_quality_check_answers_pass_token() {
        let delegate = DryRunDelegate::new("QUALITY_PASSED");
        let task = ExecutionPlanTask::new("quality", AgentKind::Quality, "review");
        let ctx = DelegateContext::new(
            "s",
            "r",
            InvocationPurpose::Quality,
            "review",
            CancellationToken::new(),
        );
        let output = delegate.execute(&task, ctx).await.unwrap();
        assert!(output.success);
        assert_eq!(output.response_text.as_deref(), Some("QUALITY_PASSED"));
        assert!(output.patch_intents.is_empty());
    }
}
