//! Budget-enforcing delegate wrapper
//!
//! Every delegate invocation of a run (plan task, quality check, repair) goes through
//! [`BudgetedDelegate`], so one tracker sees every unit of work.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::budget::BudgetTracker;
use crate::types::{DelegateContext, DelegateExecutor, DelegateOutput};
use waveforge_utils::error::DelegateError;
use waveforge_utils::types::ExecutionPlanTask;

/// Wraps a delegate and charges one tool call per invocation.
///
/// The slot is consumed before the inner delegate runs and is not refunded when the
/// inner call fails, so retry loops cannot bypass the ceiling. A cancelled context is
/// rejected without consuming budget.
pub struct BudgetedDelegate {
    inner: Arc<dyn DelegateExecutor>,
    tracker: Arc<BudgetTracker>,
}

impl BudgetedDelegate {
    #[must_use]
    pub fn new(inner: Arc<dyn DelegateExecutor>, tracker: Arc<BudgetTracker>) -> Self {
        Self { inner, tracker }
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<BudgetTracker> {
        &self.tracker
    }
}

#[async_trait]
impl DelegateExecutor for BudgetedDelegate {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        if ctx.cancel.is_cancelled() {
            return Err(DelegateError::Cancelled);
        }

        let call = match self.tracker.try_acquire_tool_call() {
            Ok(call) => call,
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "Delegate invocation denied by budget");
                return Err(err);
            }
        };

        debug!(
            task_id = %task.id,
            agent = %task.agent_id,
            call,
            "Budget check passed, invoking delegate"
        );

        let result = self.inner.execute(task, ctx).await;
        if let Err(e) = &result {
            debug!(
                task_id = %task.id,
                call,
                error = %e,
                "Delegate invocation failed (budget slot still consumed)"
            );
        }
        result
    }
}
