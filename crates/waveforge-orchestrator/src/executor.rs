//! Wave executor
//!
//! Dispatches every task of one wave concurrently on a [`JoinSet`], bounded by a
//! semaphore, and waits for all of them before returning. Results come back in the
//! wave's dispatch order no matter which task finished first.
//!
//! When the run's wall-clock deadline passes (or the run is cancelled) the wave's
//! cancellation token fires; tasks that still have not returned after the grace period
//! are aborted and reported as failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, warn};

use waveforge_delegate::{DelegateContext, DelegateExecutor, DelegateOutput, InvocationPurpose};
use waveforge_utils::error::DelegateError;
use waveforge_utils::logging::{delegate_span, log_task_error, log_wave_complete, log_wave_start, wave_span};
use waveforge_utils::types::{ExecutionPlanTask, TaskResult};

use crate::blackboard::{Blackboard, patch_intents_key, task_result_key, write_json};
use crate::events::{EventSink, OrchestrationEvent};

/// Identity and cancellation signal of the run a wave belongs to.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub session_id: String,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        session_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            session_id: session_id.into(),
            cancel,
        }
    }
}

/// What happened to one wave.
#[derive(Debug, Clone, Default)]
pub struct WaveReport {
    /// One result per task that was actually attempted, in dispatch order
    pub results: Vec<TaskResult>,
    /// Tasks the budget refused to dispatch
    pub skipped: Vec<String>,
    pub budget_denied: bool,
    /// The wall-clock deadline passed while the wave was running
    pub deadline_reached: bool,
    pub cancelled: bool,
}

impl WaveReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

type TaskOutcome = Result<DelegateOutput, DelegateError>;

pub struct WaveExecutor {
    delegate: Arc<dyn DelegateExecutor>,
    max_concurrency: usize,
    cancel_grace: Duration,
    events: Arc<dyn EventSink>,
    blackboard: Arc<dyn Blackboard>,
}

impl WaveExecutor {
    pub fn new(
        delegate: Arc<dyn DelegateExecutor>,
        max_concurrency: usize,
        cancel_grace: Duration,
        events: Arc<dyn EventSink>,
        blackboard: Arc<dyn Blackboard>,
    ) -> Self {
        Self {
            delegate,
            max_concurrency: max_concurrency.max(1),
            cancel_grace,
            events,
            blackboard,
        }
    }

    /// Run one wave to completion.
    ///
    /// Delegate errors never escape: each becomes a failed [`TaskResult`], except a
    /// budget denial, which leaves the task unattempted and listed in
    /// [`WaveReport::skipped`].
    pub async fn execute_wave(
        &self,
        index: usize,
        tasks: &[ExecutionPlanTask],
        run: &RunContext,
        deadline: Option<Instant>,
    ) -> WaveReport {
        self.execute_wave_inner(index, tasks, run, deadline)
            .instrument(wave_span(index, tasks.len()))
            .await
    }

    async fn execute_wave_inner(
        &self,
        index: usize,
        tasks: &[ExecutionPlanTask],
        run: &RunContext,
        deadline: Option<Instant>,
    ) -> WaveReport {
        let task_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        log_wave_start(index, &task_ids);
        self.events.emit(OrchestrationEvent::WaveStarted {
            index,
            task_ids,
        });
        let started = Instant::now();

        let wave_cancel = run.cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut join_set: JoinSet<(usize, TaskOutcome)> = JoinSet::new();
        let mut slots = HashMap::new();

        for (slot, task) in tasks.iter().enumerate() {
            let delegate = Arc::clone(&self.delegate);
            let semaphore = Arc::clone(&semaphore);
            let events = Arc::clone(&self.events);
            let task = task.clone();
            let ctx = DelegateContext::new(
                run.session_id.clone(),
                run.run_id.clone(),
                InvocationPurpose::Task,
                task.goal.clone(),
                wave_cancel.clone(),
            );
            let handle = join_set.spawn(async move {
                let cancel = ctx.cancel.clone();
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return (slot, Err(DelegateError::Cancelled)),
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (slot, Err(DelegateError::Cancelled)),
                    },
                };
                events.emit(OrchestrationEvent::TaskStarted {
                    task_id: task.id.clone(),
                    agent: task.agent_id,
                });
                let span = delegate_span(&task.id, task.agent_id.as_str());
                let outcome = delegate.execute(&task, ctx).instrument(span).await;
                (slot, outcome)
            });
            slots.insert(handle.id(), slot);
        }

        let mut outcomes: Vec<Option<TaskOutcome>> = (0..tasks.len()).map(|_| None).collect();
        let mut deadline_reached = false;
        let mut stop_at = deadline;
        let mut winding_down = false;

        loop {
            let joined = tokio::select! {
                joined = join_set.join_next_with_id() => joined,
                () = run.cancel.cancelled(), if !winding_down => {
                    warn!(wave = index, "Run cancelled, waiting for in-flight tasks");
                    winding_down = true;
                    stop_at = Some(Instant::now() + self.cancel_grace);
                    continue;
                }
                () = sleep_until(stop_at.unwrap_or_else(Instant::now)), if stop_at.is_some() => {
                    if winding_down {
                        warn!(wave = index, remaining = join_set.len(), "Aborting tasks that ignored cancellation");
                        join_set.abort_all();
                        stop_at = None;
                    } else {
                        warn!(wave = index, "Run deadline reached, cancelling in-flight tasks");
                        deadline_reached = true;
                        winding_down = true;
                        wave_cancel.cancel();
                        stop_at = Some(Instant::now() + self.cancel_grace);
                    }
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((_, (slot, outcome))) => outcomes[slot] = Some(outcome),
                Err(e) => {
                    let reason = if e.is_panic() {
                        "delegate task panicked"
                    } else {
                        "aborted after cancellation grace period"
                    };
                    if let Some(&slot) = slots.get(&e.id()) {
                        outcomes[slot] = Some(Err(DelegateError::Aborted(reason.to_string())));
                    }
                }
            }
        }

        let mut report = WaveReport {
            deadline_reached,
            cancelled: run.cancel.is_cancelled(),
            ..WaveReport::default()
        };
        for (task, outcome) in tasks.iter().zip(outcomes) {
            let outcome = outcome
                .unwrap_or_else(|| Err(DelegateError::Aborted("no result".to_string())));
            match outcome {
                Err(DelegateError::BudgetExceeded { limit, .. }) => {
                    debug!(task_id = %task.id, limit = %limit, "Task skipped by budget");
                    self.events.emit(OrchestrationEvent::TaskSkipped {
                        task_id: task.id.clone(),
                        agent: task.agent_id,
                        limit,
                    });
                    report.budget_denied = true;
                    report.skipped.push(task.id.clone());
                }
                Ok(output) => {
                    let result = output.into_task_result(task);
                    self.record(&result);
                    report.results.push(result);
                }
                Err(err) => {
                    let message = match &err {
                        DelegateError::Cancelled => "cancelled".to_string(),
                        other => other.to_string(),
                    };
                    log_task_error(&task.id, task.agent_id.as_str(), &message);
                    let result = TaskResult::failed(task, message);
                    self.record(&result);
                    report.results.push(result);
                }
            }
        }

        log_wave_complete(
            index,
            report.succeeded(),
            report.failed(),
            started.elapsed().as_millis(),
        );
        self.events.emit(OrchestrationEvent::WaveCompleted {
            index,
            succeeded: report.succeeded(),
            failed: report.failed(),
            skipped: report.skipped.len(),
        });
        report
    }

    fn record(&self, result: &TaskResult) {
        record_result(self.events.as_ref(), self.blackboard.as_ref(), result);
    }
}

/// Announce a finished delegate call and write it to the blackboard.
pub(crate) fn record_result(events: &dyn EventSink, board: &dyn Blackboard, result: &TaskResult) {
    events.emit(OrchestrationEvent::TaskCompleted {
        task_id: result.task_id.clone(),
        agent: result.agent_id,
        success: result.success,
        error: result.error.clone(),
    });
    for patch in &result.patch_intents {
        events.emit(OrchestrationEvent::PatchIntentProduced {
            task_id: result.task_id.clone(),
            file_path: patch.file_path.clone(),
            content_hash: patch.content_hash.clone(),
        });
    }
    write_json(board, &task_result_key(&result.task_id), result);
    if !result.patch_intents.is_empty() {
        write_json(board, &patch_intents_key(&result.task_id), &result.patch_intents);
    }
}
