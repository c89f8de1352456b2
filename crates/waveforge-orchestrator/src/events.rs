//! Orchestration lifecycle events and sinks
//!
//! Delivery is fire-and-forget: [`EventSink::emit`] never fails and nothing in the run
//! depends on an event being observed.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use waveforge_analyzer::ArtifactIssue;
use waveforge_delegate::DelegateVerdict;
use waveforge_gate::QualityGateState;
use waveforge_utils::types::{AgentKind, BudgetLimit, BudgetUsage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    RunStarted {
        run_id: String,
        session_id: String,
        task_count: usize,
        wave_count: usize,
    },
    WaveStarted {
        index: usize,
        task_ids: Vec<String>,
    },
    WaveCompleted {
        index: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    TaskStarted {
        task_id: String,
        agent: AgentKind,
    },
    TaskCompleted {
        task_id: String,
        agent: AgentKind,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Closes a `TaskStarted` whose delegate call the budget refused
    TaskSkipped {
        task_id: String,
        agent: AgentKind,
        limit: BudgetLimit,
    },
    PatchIntentProduced {
        task_id: String,
        file_path: String,
        content_hash: String,
    },
    QualityCheckCompleted {
        round: u32,
        delegate_verdict: DelegateVerdict,
        issues: Vec<ArtifactIssue>,
        passed: bool,
    },
    RepairStarted {
        round: u32,
        attempt: u32,
        issue_count: usize,
    },
    BudgetExhausted {
        limit: BudgetLimit,
        usage: BudgetUsage,
    },
    QualityGateResult {
        state: QualityGateState,
    },
    RunCompleted {
        run_id: String,
        success: bool,
    },
    RunCancelled {
        run_id: String,
    },
}

/// Observer of orchestration events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OrchestrationEvent);
}

/// Mirrors every event into the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: OrchestrationEvent) {
        match &event {
            OrchestrationEvent::RunStarted {
                run_id,
                task_count,
                wave_count,
                ..
            } => info!(run_id = %run_id, task_count, wave_count, "Run started"),
            OrchestrationEvent::WaveStarted { index, task_ids } => {
                info!(wave = index, tasks = task_ids.len(), "Wave started");
            }
            OrchestrationEvent::WaveCompleted {
                index,
                succeeded,
                failed,
                skipped,
            } => info!(wave = index, succeeded, failed, skipped, "Wave completed"),
            OrchestrationEvent::TaskStarted { task_id, agent } => {
                info!(task_id = %task_id, agent = %agent, "Task started");
            }
            OrchestrationEvent::TaskCompleted {
                task_id,
                agent,
                success,
                error,
            } => {
                if *success {
                    info!(task_id = %task_id, agent = %agent, "Task completed");
                } else {
                    warn!(
                        task_id = %task_id,
                        agent = %agent,
                        error = error.as_deref().unwrap_or("unsuccessful"),
                        "Task failed"
                    );
                }
            }
            OrchestrationEvent::TaskSkipped {
                task_id,
                agent,
                limit,
            } => warn!(task_id = %task_id, agent = %agent, limit = %limit, "Task skipped by budget"),
            OrchestrationEvent::PatchIntentProduced {
                task_id, file_path, ..
            } => info!(task_id = %task_id, file = %file_path, "Patch intent produced"),
            OrchestrationEvent::QualityCheckCompleted {
                round,
                delegate_verdict,
                issues,
                passed,
            } => info!(
                round,
                verdict = %delegate_verdict,
                issues = issues.len(),
                passed,
                "Quality check completed"
            ),
            OrchestrationEvent::RepairStarted {
                round,
                attempt,
                issue_count,
            } => info!(round, attempt, issue_count, "Repair started"),
            OrchestrationEvent::BudgetExhausted { limit, usage } => warn!(
                limit = %limit,
                tool_calls_used = usage.tool_calls_used,
                iterations_used = usage.iterations_used,
                elapsed_ms = usage.elapsed_ms,
                "Budget exhausted"
            ),
            OrchestrationEvent::QualityGateResult { state } => info!(
                gate = %state.gate,
                status = %state.status,
                "Quality gate result"
            ),
            OrchestrationEvent::RunCompleted { run_id, success } => {
                info!(run_id = %run_id, success, "Run completed");
            }
            OrchestrationEvent::RunCancelled { run_id } => {
                warn!(run_id = %run_id, "Run cancelled");
            }
        }
    }
}

/// Forwards events to an unbounded channel. A closed receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<OrchestrationEvent>,
}

impl ChannelEventSink {
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<OrchestrationEvent>) -> Self {
        Self { sender }
    }

    /// A sink plus the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestrationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: OrchestrationEvent) {
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<OrchestrationEvent>>,
}

impl CollectingEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<OrchestrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&OrchestrationEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: OrchestrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: OrchestrationEvent) {}
}
