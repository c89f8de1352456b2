//! Run controller
//!
//! Validates the plan, dispatches its waves, runs the quality/repair loop and folds
//! everything into a [`RunOutcome`]. Only structural plan errors are returned as `Err`;
//! every other failure mode ends in a structured outcome.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use waveforge_analyzer::AnalyzerOptions;
use waveforge_analyzer::ArtifactAnalyzer;
use waveforge_config::Config;
use waveforge_delegate::{BudgetTracker, BudgetedDelegate, DelegateExecutor, VerdictParser};
use waveforge_gate::summary::stopped_summary;
use waveforge_gate::{QualityCheckOutcome, QualityGateState};
use waveforge_utils::canonicalization::plan_fingerprint;
use waveforge_utils::error::PlanError;
use waveforge_utils::exit_codes::ExitCode;
use waveforge_utils::logging::run_span;
use waveforge_utils::types::{
    AgentKind, BudgetLimit, BudgetUsage, ExecutionPlan, ExecutionPlanTask, RuntimeBudget,
    TaskResult,
};

use crate::artifacts::ArtifactStore;
use crate::blackboard::{Blackboard, InMemoryBlackboard, QUALITY_GATE_KEY, RUN_OUTCOME_KEY, write_json};
use crate::events::{EventSink, OrchestrationEvent, TracingEventSink};
use crate::executor::{RunContext, WaveExecutor};
use crate::plan::validate_plan;
use crate::repair::{LoopOutcome, LoopStop, QualityLoop, QualityLoopSettings};
use crate::scheduler::{Wave, compute_waves};

const DEFAULT_QUALITY_INSTRUCTION: &str =
    "Review the artifact tree against the plan and answer with the pass or fail token.";
const DEFAULT_REPAIR_INSTRUCTION: &str = "Fix every listed issue in the artifact tree.";

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every wave ran and the quality gate passed
    Completed,
    QualityGateFailed,
    BudgetExhausted,
    Cancelled,
}

impl StopReason {
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Completed => ExitCode::SUCCESS,
            Self::QualityGateFailed => ExitCode::QUALITY_GATE_FAILED,
            Self::BudgetExhausted => ExitCode::BUDGET_EXHAUSTED,
            Self::Cancelled => ExitCode::CANCELLED,
        }
    }
}

/// Structured result of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: String,
    pub session_id: String,
    /// Gate passed, budget not exhausted, not cancelled
    pub success: bool,
    /// One per attempted task, in dispatch order
    pub task_results: Vec<TaskResult>,
    /// Tasks whose result is unsuccessful
    pub degraded_task_ids: Vec<String>,
    /// Tasks never attempted because the run stopped first
    pub skipped_task_ids: Vec<String>,
    pub quality_gate: QualityGateState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_check: Option<QualityCheckOutcome>,
    pub unresolved_issues: Vec<String>,
    pub budget_usage: BudgetUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_stop_reason: Option<BudgetLimit>,
    pub stop_reason: StopReason,
    pub waves_executed: usize,
    pub delegate_invocations: u32,
}

impl RunOutcome {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        self.stop_reason.exit_code()
    }
}

/// Knobs for one controller, normally taken from [`Config`].
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub budget: RuntimeBudget,
    pub max_concurrency: usize,
    pub cancel_grace: Duration,
    pub quality: QualityLoopSettings,
    pub analyzer: AnalyzerOptions,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&Config::defaults())
    }
}

impl RunSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget: config.runtime_budget(),
            max_concurrency: config.max_concurrency(),
            cancel_grace: config.cancel_grace(),
            quality: QualityLoopSettings {
                gate_name: config.gate_name().to_string(),
                max_rounds: config.max_repair_rounds(),
                attempts_per_round: config.repair_attempts_per_round(),
                verdict: VerdictParser::new(config.pass_token(), config.fail_token()),
            },
            analyzer: AnalyzerOptions {
                entry: config.analyzer.entry.clone(),
                route_contract: None,
                extra_generic_routes: config.analyzer.extra_generic_routes.clone(),
            },
        }
    }

    #[must_use]
    pub fn with_budget(mut self, budget: RuntimeBudget) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_max_repair_rounds(mut self, rounds: u32) -> Self {
        self.quality.max_rounds = rounds;
        self
    }
}

/// Owns the budget tracker and result accumulators for the duration of a run.
///
/// `run` takes `&mut self`, so one controller drives at most one run at a time; the
/// tracker is reset at the start of every run.
pub struct RunController {
    delegate: Arc<dyn DelegateExecutor>,
    store: Arc<dyn ArtifactStore>,
    settings: RunSettings,
    tracker: Arc<BudgetTracker>,
    events: Arc<dyn EventSink>,
    blackboard: Arc<dyn Blackboard>,
}

impl RunController {
    pub fn new(
        delegate: Arc<dyn DelegateExecutor>,
        store: Arc<dyn ArtifactStore>,
        settings: RunSettings,
    ) -> Self {
        let tracker = Arc::new(BudgetTracker::new(settings.budget));
        Self {
            delegate,
            store,
            settings,
            tracker,
            events: Arc::new(TracingEventSink),
            blackboard: Arc::new(InMemoryBlackboard::new()),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_blackboard(mut self, blackboard: Arc<dyn Blackboard>) -> Self {
        self.blackboard = blackboard;
        self
    }

    #[must_use]
    pub fn with_analyzer_options(mut self, options: AnalyzerOptions) -> Self {
        self.settings.analyzer = options;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    #[must_use]
    pub fn blackboard(&self) -> &Arc<dyn Blackboard> {
        &self.blackboard
    }

    /// Execute `plan` against `session_id`'s artifact tree.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when the plan fails strict validation; nothing is dispatched
    /// in that case.
    pub async fn run(
        &mut self,
        plan: &ExecutionPlan,
        session_id: &str,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, PlanError> {
        validate_plan(&plan.tasks)?;
        let waves = compute_waves(&plan.tasks)?;

        let run = RunContext::new(Uuid::new_v4().to_string(), session_id, cancel);
        let span = run_span(&run.run_id, &run.session_id);
        Ok(self.execute(plan, &waves, &run).instrument(span).await)
    }

    async fn execute(&mut self, plan: &ExecutionPlan, waves: &[Wave], run: &RunContext) -> RunOutcome {
        self.tracker.reset();
        match plan_fingerprint(&plan.tasks) {
            Ok(fingerprint) => info!(plan_id = %plan.id, fingerprint = %fingerprint, "Starting run"),
            Err(e) => debug!(error = %e, "Could not fingerprint plan"),
        }
        self.events.emit(OrchestrationEvent::RunStarted {
            run_id: run.run_id.clone(),
            session_id: run.session_id.clone(),
            task_count: plan.tasks.len(),
            wave_count: waves.len(),
        });

        let budgeted: Arc<dyn DelegateExecutor> = Arc::new(BudgetedDelegate::new(
            Arc::clone(&self.delegate),
            Arc::clone(&self.tracker),
        ));
        let executor = WaveExecutor::new(
            Arc::clone(&budgeted),
            self.settings.max_concurrency,
            self.settings.cancel_grace,
            Arc::clone(&self.events),
            Arc::clone(&self.blackboard),
        );

        let mut task_results = Vec::new();
        let mut skipped_task_ids = Vec::new();
        let mut waves_executed = 0;
        let mut stopped_at = None;

        for (index, wave) in waves.iter().enumerate() {
            let dispatchable: Vec<ExecutionPlanTask> = wave
                .iter()
                .filter(|t| !t.agent_id.is_gate_kind())
                .cloned()
                .collect();
            if dispatchable.is_empty() {
                continue;
            }
            if run.cancel.is_cancelled() || self.tracker.is_exhausted() {
                stopped_at = Some(index);
                break;
            }
            if let Err(e) = self.tracker.begin_iteration() {
                debug!(wave = index, error = %e, "Wave not dispatched");
                stopped_at = Some(index);
                break;
            }

            let deadline = self
                .tracker
                .remaining_duration()
                .map(|remaining| Instant::now() + remaining);
            let report = executor
                .execute_wave(index, &dispatchable, run, deadline)
                .await;
            waves_executed += 1;
            if report.deadline_reached {
                self.tracker.mark_exhausted(BudgetLimit::MaxDuration);
            }
            task_results.extend(report.results);
            skipped_task_ids.extend(report.skipped);

            if report.cancelled || self.tracker.is_exhausted() {
                stopped_at = Some(index + 1);
                break;
            }
        }

        if let Some(first_unrun) = stopped_at {
            skipped_task_ids.extend(
                waves[first_unrun.min(waves.len())..]
                    .iter()
                    .flatten()
                    .filter(|t| !t.agent_id.is_gate_kind())
                    .map(|t| t.id.clone()),
            );
        }

        let loop_outcome = if run.cancel.is_cancelled() || self.tracker.is_exhausted() {
            None
        } else {
            let (quality_task, repair_task) = gate_tasks(plan);
            let quality_loop = QualityLoop::new(
                budgeted,
                Arc::clone(&self.tracker),
                Arc::clone(&self.store),
                ArtifactAnalyzer::new(self.settings.analyzer.clone()),
                self.settings.quality.clone(),
                Arc::clone(&self.events),
            )
            .with_blackboard(Arc::clone(&self.blackboard))
            .with_cancel_grace(self.settings.cancel_grace);
            Some(quality_loop.run(run, &quality_task, &repair_task).await)
        };

        self.finish(run, task_results, skipped_task_ids, waves_executed, loop_outcome)
    }

    fn finish(
        &self,
        run: &RunContext,
        task_results: Vec<TaskResult>,
        skipped_task_ids: Vec<String>,
        waves_executed: usize,
        loop_outcome: Option<LoopOutcome>,
    ) -> RunOutcome {
        let usage = self.tracker.usage();
        let budget_stop_reason = self.tracker.exhausted();
        let cancelled = run.cancel.is_cancelled()
            || loop_outcome
                .as_ref()
                .is_some_and(|o| o.stop == LoopStop::Cancelled);

        let (quality_gate, quality_check) = match loop_outcome {
            Some(outcome) => (outcome.gate, outcome.last_check),
            None => {
                let reason = match budget_stop_reason {
                    Some(limit) if !cancelled => format!("budget exhausted ({limit})"),
                    _ => "run cancelled".to_string(),
                };
                (
                    QualityGateState::failed(
                        &self.settings.quality.gate_name,
                        stopped_summary(&reason, &[]),
                    ),
                    None,
                )
            }
        };

        let mut unresolved_issues = Vec::new();
        if !quality_gate.is_passed()
            && let Some(check) = &quality_check
        {
            unresolved_issues.extend(check.failure_reasons());
        }
        if let Some(limit) = budget_stop_reason {
            let (used, max) = usage.counts_for(limit);
            let max = max.map_or_else(|| "unlimited".to_string(), |m| m.to_string());
            unresolved_issues.push(format!(
                "budget exhausted: {limit} limit reached ({used} of {max})"
            ));
            self.events.emit(OrchestrationEvent::BudgetExhausted { limit, usage });
        }

        let stop_reason = if cancelled {
            StopReason::Cancelled
        } else if budget_stop_reason.is_some() {
            StopReason::BudgetExhausted
        } else if quality_gate.is_passed() {
            StopReason::Completed
        } else {
            StopReason::QualityGateFailed
        };
        let success = stop_reason == StopReason::Completed;

        let degraded_task_ids = task_results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.task_id.clone())
            .collect();

        self.events.emit(OrchestrationEvent::QualityGateResult {
            state: quality_gate.clone(),
        });
        write_json(self.blackboard.as_ref(), QUALITY_GATE_KEY, &quality_gate);

        let outcome = RunOutcome {
            run_id: run.run_id.clone(),
            session_id: run.session_id.clone(),
            success,
            task_results,
            degraded_task_ids,
            skipped_task_ids,
            quality_gate,
            quality_check,
            unresolved_issues,
            budget_usage: usage,
            budget_stop_reason,
            stop_reason,
            waves_executed,
            delegate_invocations: usage.tool_calls_used,
        };
        write_json(self.blackboard.as_ref(), RUN_OUTCOME_KEY, &outcome);

        if cancelled {
            warn!(run_id = %run.run_id, "Run cancelled");
            self.events.emit(OrchestrationEvent::RunCancelled {
                run_id: run.run_id.clone(),
            });
        } else {
            self.events.emit(OrchestrationEvent::RunCompleted {
                run_id: run.run_id.clone(),
                success,
            });
        }
        outcome
    }
}

/// The quality and repair instructions: the plan's own gate tasks, or defaults.
fn gate_tasks(plan: &ExecutionPlan) -> (ExecutionPlanTask, ExecutionPlanTask) {
    let quality = plan.first_of_kind(AgentKind::Quality).cloned().unwrap_or_else(|| {
        ExecutionPlanTask::new("quality", AgentKind::Quality, DEFAULT_QUALITY_INSTRUCTION)
    });
    let repair = plan.first_of_kind(AgentKind::Repair).cloned().unwrap_or_else(|| {
        ExecutionPlanTask::new("repair", AgentKind::Repair, DEFAULT_REPAIR_INSTRUCTION)
    });
    (quality, repair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::events::CollectingEventSink;
    use crate::test_support::{HangingQualityDelegate, SESSION, ScriptedDelegate, clean_app};
    use waveforge_gate::GateStatus;

    fn pipeline_plan() -> ExecutionPlan {
        let task = |id: &str, kind, deps: &[&str]| {
            ExecutionPlanTask::new(id, kind, format!("do {id}")).with_dependencies(deps.to_vec())
        };
        ExecutionPlan::new(
            "plan-1",
            vec![
                task("scaffold", AgentKind::Scaffold, &[]),
                task("page", AgentKind::Page, &["scaffold"]),
                task("state", AgentKind::State, &["scaffold"]),
                task("style", AgentKind::Style, &["scaffold"]),
                task("interaction", AgentKind::Interaction, &["page", "state", "style"]),
                task("quality", AgentKind::Quality, &["interaction"]),
                task("repair", AgentKind::Repair, &["quality"]),
            ],
        )
    }

    fn controller(
        delegate: Arc<ScriptedDelegate>,
        settings: RunSettings,
    ) -> (RunController, Arc<CollectingEventSink>) {
        let events = Arc::new(CollectingEventSink::new());
        let store = Arc::new(InMemoryArtifactStore::with_files(SESSION, clean_app()));
        let controller = RunController::new(delegate, store, settings).with_events(events.clone());
        (controller, events)
    }

    #[tokio::test]
    async fn test_successful_run() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let (mut controller, events) = controller(delegate.clone(), RunSettings::default());
        let outcome = controller
            .run(&pipeline_plan(), SESSION, CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.success, "{}", outcome.quality_gate.summary);
        assert_eq!(outcome.stop_reason, StopReason::Completed);
        assert_eq!(outcome.waves_executed, 3);
        assert_eq!(outcome.task_results.len(), 5);
        assert_eq!(outcome.delegate_invocations, 6);
        assert!(outcome.unresolved_issues.is_empty());
        assert_eq!(outcome.exit_code(), ExitCode::SUCCESS);
        assert_eq!(
            events.count(|e| matches!(e, OrchestrationEvent::RunCompleted { success: true, .. })),
            1
        );
        assert!(controller.blackboard().read(QUALITY_GATE_KEY).is_some());
        assert!(controller.blackboard().read(RUN_OUTCOME_KEY).is_some());
    }

    #[tokio::test]
    async fn test_failed_task_does_not_fail_a_passing_run() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let (mut controller, _) = controller(delegate, RunSettings::default());
        let plan = ExecutionPlan::new(
            "p",
            vec![
                ExecutionPlanTask::new("fail-style", AgentKind::Style, "tokens"),
                ExecutionPlanTask::new("page", AgentKind::Page, "home"),
            ],
        );
        let outcome = controller
            .run(&plan, SESSION, CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.degraded_task_ids, vec!["fail-style".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_plan_dispatches_nothing() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let (mut controller, _) = controller(delegate.clone(), RunSettings::default());
        let plan = ExecutionPlan::new(
            "p",
            vec![ExecutionPlanTask::new("a", AgentKind::Page, "x").with_dependencies(["ghost"])],
        );
        let err = controller
            .run(&plan, SESSION, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::DanglingDependencies { .. }));
        assert_eq!(delegate.invocations(), 0);
    }

    #[tokio::test]
    async fn test_tool_call_budget_stops_run() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let settings =
            RunSettings::default().with_budget(RuntimeBudget::unlimited().with_max_tool_calls(1));
        let (mut controller, events) = controller(delegate.clone(), settings);
        let plan = ExecutionPlan::new(
            "p",
            vec![
                ExecutionPlanTask::new("a", AgentKind::Scaffold, "init"),
                ExecutionPlanTask::new("b", AgentKind::Page, "home").with_dependencies(["a"]),
            ],
        );
        let outcome = controller
            .run(&plan, SESSION, CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.budget_stop_reason, Some(BudgetLimit::MaxToolCalls));
        assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(delegate.invocations(), 1);
        assert_eq!(outcome.skipped_task_ids, vec!["b".to_string()]);
        assert_eq!(
            outcome.unresolved_issues,
            vec!["budget exhausted: maxToolCalls limit reached (1 of 1)".to_string()]
        );
        assert_eq!(outcome.quality_gate.status, GateStatus::Failed);
        assert_eq!(
            events.count(|e| matches!(e, OrchestrationEvent::BudgetExhausted { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_budget_reached_exactly_is_not_exhaustion() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let settings =
            RunSettings::default().with_budget(RuntimeBudget::unlimited().with_max_tool_calls(2));
        let (mut controller, _) = controller(delegate, settings);
        let plan = ExecutionPlan::new(
            "p",
            vec![ExecutionPlanTask::new("a", AgentKind::Scaffold, "init")],
        );
        let outcome = controller
            .run(&plan, SESSION, CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.budget_usage.tool_calls_used, 2);
        assert!(outcome.budget_stop_reason.is_none());
    }

    #[tokio::test]
    async fn test_quality_failure_is_distinct_from_budget() {
        let delegate = Arc::new(ScriptedDelegate::never_passing());
        let settings = RunSettings::default().with_max_repair_rounds(1);
        let (mut controller, _) = controller(delegate.clone(), settings);
        let outcome = controller
            .run(&pipeline_plan(), SESSION, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::QualityGateFailed);
        assert!(outcome.budget_stop_reason.is_none());
        assert_eq!(
            outcome.unresolved_issues,
            vec!["quality delegate reported failure".to_string()]
        );
        // five build tasks, then check, repair, check
        assert_eq!(delegate.invocations(), 8);
        assert_eq!(outcome.exit_code(), ExitCode::QUALITY_GATE_FAILED);
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let (mut controller, events) = controller(delegate.clone(), RunSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = controller
            .run(&pipeline_plan(), SESSION, cancel)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert!(!outcome.success);
        assert_eq!(delegate.invocations(), 0);
        assert_eq!(outcome.skipped_task_ids.len(), 5);
        assert!(outcome.quality_gate.summary.contains("run cancelled"));
        assert_eq!(
            events.count(|e| matches!(e, OrchestrationEvent::RunCancelled { .. })),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_budget_covers_the_quality_loop() {
        let settings =
            RunSettings::default().with_budget(RuntimeBudget::unlimited().with_max_duration_ms(50));
        let store = Arc::new(InMemoryArtifactStore::with_files(SESSION, clean_app()));
        let mut controller =
            RunController::new(Arc::new(HangingQualityDelegate::default()), store, settings);
        let plan = ExecutionPlan::new(
            "slow",
            vec![ExecutionPlanTask::new("scaffold", AgentKind::Scaffold, "skeleton")],
        );
        let started = Instant::now();
        let outcome = controller
            .run(&plan, SESSION, CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
        assert_eq!(outcome.budget_stop_reason, Some(BudgetLimit::MaxDuration));
        assert_eq!(outcome.exit_code(), ExitCode::BUDGET_EXHAUSTED);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_empty_plan_goes_straight_to_quality_gate() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let (mut controller, _) = controller(delegate.clone(), RunSettings::default());
        let outcome = controller
            .run(&ExecutionPlan::new("empty", vec![]), SESSION, CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.waves_executed, 0);
        assert_eq!(delegate.invocations(), 1);
    }

    #[test]
    fn test_outcome_serializes_budget_stop_reason() {
        let outcome = RunOutcome {
            run_id: "r".into(),
            session_id: "s".into(),
            success: false,
            task_results: vec![],
            degraded_task_ids: vec![],
            skipped_task_ids: vec!["b".into()],
            quality_gate: QualityGateState::failed("artifact-quality", "x"),
            quality_check: None,
            unresolved_issues: vec![],
            budget_usage: BudgetUsage::default(),
            budget_stop_reason: Some(BudgetLimit::MaxToolCalls),
            stop_reason: StopReason::BudgetExhausted,
            waves_executed: 1,
            delegate_invocations: 1,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["budgetStopReason"], "maxToolCalls");
        assert_eq!(json["stopReason"], "budget_exhausted");
        assert_eq!(json["skippedTaskIds"][0], "b");
    }
}
