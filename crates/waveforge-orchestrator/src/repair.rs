//! Quality/repair loop
//!
//! Each round runs one quality check (delegate verdict plus analyzer pass) and, while
//! the check fails and rounds remain, `attempts_per_round` repair calls. With
//! `max_rounds = N`, `k` attempts per round and a check that never passes, the loop makes
//! exactly `(1 + k) * N + 1` delegate invocations.
//!
//! Every call runs under the run's wall-clock deadline. A call still in flight at the
//! deadline is cancelled, dropped after the grace period, and ends the loop with
//! [`LoopStop::BudgetExhausted`].

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{Instrument, debug, info, warn};

use waveforge_analyzer::{ArtifactAnalyzer, ArtifactIssue, IssueCategory};
use waveforge_delegate::{
    BudgetTracker, DelegateContext, DelegateExecutor, DelegateOutput, DelegateVerdict,
    InvocationPurpose, VerdictParser,
};
use waveforge_gate::summary::{exhausted_summary, passed_summary, stopped_summary};
use waveforge_gate::{QualityCheckOutcome, QualityGateState};
use waveforge_utils::error::DelegateError;
use waveforge_utils::logging::quality_round_span;
use waveforge_utils::types::{BudgetLimit, ExecutionPlanTask, TaskResult};

use crate::artifacts::ArtifactStore;
use crate::blackboard::{Blackboard, InMemoryBlackboard, repair_record_id};
use crate::events::{EventSink, OrchestrationEvent};
use crate::executor::{RunContext, record_result};

const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct QualityLoopSettings {
    pub gate_name: String,
    pub max_rounds: u32,
    pub attempts_per_round: u32,
    pub verdict: VerdictParser,
}

impl Default for QualityLoopSettings {
    fn default() -> Self {
        Self {
            gate_name: "artifact-quality".to_string(),
            max_rounds: 2,
            attempts_per_round: 1,
            verdict: VerdictParser::default(),
        }
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// The gate reached `passed` or `failed` on its own terms
    Decided,
    BudgetExhausted(BudgetLimit),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub gate: QualityGateState,
    /// The most recent completed quality check
    pub last_check: Option<QualityCheckOutcome>,
    pub checks: u32,
    pub repairs: u32,
    /// Repair rounds started
    pub rounds: u32,
    pub stop: LoopStop,
}

impl LoopOutcome {
    /// Quality and repair delegate calls that were actually dispatched.
    #[must_use]
    pub fn invocations(&self) -> u32 {
        self.checks + self.repairs
    }
}

pub struct QualityLoop {
    delegate: Arc<dyn DelegateExecutor>,
    tracker: Arc<BudgetTracker>,
    store: Arc<dyn ArtifactStore>,
    analyzer: ArtifactAnalyzer,
    settings: QualityLoopSettings,
    events: Arc<dyn EventSink>,
    blackboard: Arc<dyn Blackboard>,
    cancel_grace: Duration,
}

struct LoopState {
    checks: u32,
    repairs: u32,
    round: u32,
    last_check: Option<QualityCheckOutcome>,
}

impl QualityLoop {
    pub fn new(
        delegate: Arc<dyn DelegateExecutor>,
        tracker: Arc<BudgetTracker>,
        store: Arc<dyn ArtifactStore>,
        analyzer: ArtifactAnalyzer,
        settings: QualityLoopSettings,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            delegate,
            tracker,
            store,
            analyzer,
            settings,
            events,
            blackboard: Arc::new(InMemoryBlackboard::new()),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    /// Where repair results and their patch intents are written.
    #[must_use]
    pub fn with_blackboard(mut self, blackboard: Arc<dyn Blackboard>) -> Self {
        self.blackboard = blackboard;
        self
    }

    /// How long a call cut off by the deadline may take to honor cancellation.
    #[must_use]
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Drive the loop to a terminal gate state.
    ///
    /// `quality_task` and `repair_task` carry the instructions handed to the delegate.
    pub async fn run(
        &self,
        run: &RunContext,
        quality_task: &ExecutionPlanTask,
        repair_task: &ExecutionPlanTask,
    ) -> LoopOutcome {
        let mut state = LoopState {
            checks: 0,
            repairs: 0,
            round: 0,
            last_check: None,
        };

        loop {
            let round = state.round;
            let span = quality_round_span(round);

            if run.cancel.is_cancelled() {
                return self.stopped(state, LoopStop::Cancelled);
            }
            if let Err(err) = self.tracker.begin_iteration() {
                return self.stopped(state, budget_stop(&err));
            }

            let check = match self
                .check(run, quality_task, round)
                .instrument(span.clone())
                .await
            {
                Ok(check) => check,
                Err(stop) => return self.stopped(state, stop),
            };
            state.checks += 1;
            self.events.emit(OrchestrationEvent::QualityCheckCompleted {
                round,
                delegate_verdict: check.delegate_verdict,
                issues: check.analyzer_issues.clone(),
                passed: check.passed(),
            });

            if check.passed() {
                info!(round, "Quality gate passed");
                return LoopOutcome {
                    gate: QualityGateState::passed(
                        &self.settings.gate_name,
                        passed_summary(state.checks, round),
                    ),
                    last_check: Some(check),
                    checks: state.checks,
                    repairs: state.repairs,
                    rounds: round,
                    stop: LoopStop::Decided,
                };
            }
            if check.analyzer_overrode_delegate() {
                warn!(
                    round,
                    issues = check.analyzer_issues.len(),
                    "Analyzer rejected an affirmative quality verdict"
                );
            }

            if round >= self.settings.max_rounds {
                warn!(round, "Repair rounds exhausted");
                return LoopOutcome {
                    gate: QualityGateState::failed(
                        &self.settings.gate_name,
                        exhausted_summary(round, &check),
                    ),
                    last_check: Some(check),
                    checks: state.checks,
                    repairs: state.repairs,
                    rounds: round,
                    stop: LoopStop::Decided,
                };
            }

            let issues = check.failure_reasons();
            state.last_check = Some(check);
            state.round += 1;
            if let Err(stop) = self
                .repair(run, repair_task, round, issues, &mut state)
                .instrument(span)
                .await
            {
                return self.stopped(state, stop);
            }
        }
    }

    async fn check(
        &self,
        run: &RunContext,
        task: &ExecutionPlanTask,
        round: u32,
    ) -> Result<QualityCheckOutcome, LoopStop> {
        let ctx = DelegateContext::new(
            run.session_id.clone(),
            run.run_id.clone(),
            InvocationPurpose::Quality,
            task.goal.clone(),
            run.cancel.child_token(),
        )
        .with_round(round);

        let verdict = match self.dispatch(task, ctx).await? {
            Ok(output) => self
                .settings
                .verdict
                .parse_opt(output.response_text.as_deref()),
            Err(DelegateError::Cancelled) => return Err(LoopStop::Cancelled),
            Err(err @ DelegateError::BudgetExceeded { .. }) => return Err(budget_stop(&err)),
            Err(err) => {
                warn!(round, error = %err, "Quality delegate call failed");
                DelegateVerdict::Unavailable
            }
        };

        let issues = match self.store.list_files(&run.session_id).await {
            Ok(files) => self.analyzer.analyze(&files).issues,
            Err(err) => {
                warn!(round, error = %err, "Artifact tree unavailable for analysis");
                vec![ArtifactIssue::new(
                    IssueCategory::Entry,
                    format!("artifact tree unavailable: {err}"),
                    None,
                )]
            }
        };
        debug!(round, verdict = %verdict, issues = issues.len(), "Quality check finished");
        Ok(QualityCheckOutcome::new(verdict, issues))
    }

    async fn repair(
        &self,
        run: &RunContext,
        task: &ExecutionPlanTask,
        round: u32,
        issues: Vec<String>,
        state: &mut LoopState,
    ) -> Result<(), LoopStop> {
        for attempt in 0..self.settings.attempts_per_round {
            if run.cancel.is_cancelled() {
                return Err(LoopStop::Cancelled);
            }
            self.events.emit(OrchestrationEvent::RepairStarted {
                round,
                attempt,
                issue_count: issues.len(),
            });
            let ctx = DelegateContext::new(
                run.session_id.clone(),
                run.run_id.clone(),
                InvocationPurpose::Repair,
                task.goal.clone(),
                run.cancel.child_token(),
            )
            .with_round(round)
            .with_issues(issues.clone());

            let mut result = match self.dispatch(task, ctx).await? {
                Ok(output) => {
                    debug!(
                        round,
                        attempt,
                        success = output.success,
                        patches = output.patch_intents.len(),
                        "Repair attempt finished"
                    );
                    output.into_task_result(task)
                }
                Err(DelegateError::Cancelled) => return Err(LoopStop::Cancelled),
                Err(err @ DelegateError::BudgetExceeded { .. }) => return Err(budget_stop(&err)),
                Err(err) => {
                    warn!(round, attempt, error = %err, "Repair attempt failed");
                    TaskResult::failed(task, err.to_string())
                }
            };
            state.repairs += 1;
            result.task_id = repair_record_id(round, attempt);
            record_result(self.events.as_ref(), self.blackboard.as_ref(), &result);
        }
        Ok(())
    }

    /// Run one delegate call under the run's wall-clock deadline.
    ///
    /// The outer `Err` means the loop must stop; the inner result is the delegate's own.
    async fn dispatch(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<Result<DelegateOutput, DelegateError>, LoopStop> {
        let call_cancel = ctx.cancel.clone();
        let deadline = self
            .tracker
            .remaining_duration()
            .map(|remaining| Instant::now() + remaining);
        let mut call = self.delegate.execute(task, ctx);

        let result = match deadline {
            None => call.await,
            Some(deadline) => match timeout_at(deadline, &mut call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(task_id = %task.id, "Run deadline reached, cancelling delegate call");
                    call_cancel.cancel();
                    if timeout(self.cancel_grace, &mut call).await.is_err() {
                        warn!(task_id = %task.id, "Dropping delegate call that ignored cancellation");
                    }
                    self.tracker.mark_exhausted(BudgetLimit::MaxDuration);
                    return Err(LoopStop::BudgetExhausted(BudgetLimit::MaxDuration));
                }
            },
        };
        if let Err(err) = self.tracker.check_duration() {
            return Err(budget_stop(&err));
        }
        Ok(result)
    }

    fn stopped(&self, state: LoopState, stop: LoopStop) -> LoopOutcome {
        let reason = match stop {
            LoopStop::BudgetExhausted(limit) => format!("budget exhausted ({limit})"),
            LoopStop::Cancelled => "run cancelled".to_string(),
            LoopStop::Decided => "stopped".to_string(),
        };
        let unresolved: &[ArtifactIssue] = state
            .last_check
            .as_ref()
            .map(|check| check.analyzer_issues.as_slice())
            .unwrap_or_default();
        warn!(reason = %reason, round = state.round, "Quality loop stopped early");
        LoopOutcome {
            gate: QualityGateState::failed(
                &self.settings.gate_name,
                stopped_summary(&reason, unresolved),
            ),
            last_check: state.last_check,
            checks: state.checks,
            repairs: state.repairs,
            rounds: state.round,
            stop,
        }
    }
}

fn budget_stop(err: &DelegateError) -> LoopStop {
    match err {
        DelegateError::BudgetExceeded { limit, .. } => LoopStop::BudgetExhausted(*limit),
        _ => LoopStop::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::events::CollectingEventSink;
    use crate::blackboard::patch_intents_key;
    use crate::test_support::{HangingQualityDelegate, SESSION, ScriptedDelegate, clean_app};
    use tokio_util::sync::CancellationToken;
    use waveforge_delegate::BudgetedDelegate;
    use waveforge_gate::GateStatus;
    use waveforge_utils::types::{AgentKind, RuntimeBudget};

    fn tasks() -> (ExecutionPlanTask, ExecutionPlanTask) {
        (
            ExecutionPlanTask::new("quality", AgentKind::Quality, "review the app"),
            ExecutionPlanTask::new("repair", AgentKind::Repair, "fix the issues"),
        )
    }

    fn quality_loop(
        delegate: Arc<ScriptedDelegate>,
        budget: RuntimeBudget,
        max_rounds: u32,
        attempts_per_round: u32,
        files: Vec<(&'static str, &'static str)>,
    ) -> QualityLoop {
        let tracker = Arc::new(BudgetTracker::new(budget));
        let budgeted = Arc::new(BudgetedDelegate::new(delegate, tracker.clone()));
        QualityLoop::new(
            budgeted,
            tracker,
            Arc::new(InMemoryArtifactStore::with_files(SESSION, files)),
            ArtifactAnalyzer::default(),
            QualityLoopSettings {
                max_rounds,
                attempts_per_round,
                ..QualityLoopSettings::default()
            },
            Arc::new(CollectingEventSink::new()),
        )
    }

    fn run_ctx() -> RunContext {
        RunContext::new("run-1", SESSION, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_never_passing_makes_two_n_plus_one_calls() {
        for n in 0..4 {
            let delegate = Arc::new(ScriptedDelegate::never_passing());
            let qloop = quality_loop(delegate.clone(), RuntimeBudget::unlimited(), n, 1, clean_app());
            let (quality, repair) = tasks();
            let outcome = qloop.run(&run_ctx(), &quality, &repair).await;

            assert_eq!(delegate.invocations(), 2 * n + 1, "max_rounds = {n}");
            assert_eq!(outcome.invocations(), 2 * n + 1);
            assert_eq!(outcome.gate.status, GateStatus::Failed);
            assert!(outcome.gate.summary.starts_with("degraded completion"));
            assert_eq!(outcome.stop, LoopStop::Decided);
        }
    }

    #[tokio::test]
    async fn test_passing_after_k_repairs() {
        let n = 3;
        for k in 0..=n {
            let delegate = Arc::new(ScriptedDelegate::passing_after(k));
            let qloop = quality_loop(delegate.clone(), RuntimeBudget::unlimited(), n, 1, clean_app());
            let (quality, repair) = tasks();
            let outcome = qloop.run(&run_ctx(), &quality, &repair).await;

            assert!(outcome.gate.is_passed(), "k = {k}: {}", outcome.gate.summary);
            assert_eq!(delegate.invocations(), 2 * k + 1);
            assert_eq!(outcome.rounds, k);
        }
    }

    #[tokio::test]
    async fn test_multiple_attempts_per_round() {
        let delegate = Arc::new(ScriptedDelegate::never_passing());
        let qloop = quality_loop(delegate.clone(), RuntimeBudget::unlimited(), 2, 3, clean_app());
        let (quality, repair) = tasks();
        qloop.run(&run_ctx(), &quality, &repair).await;
        // (1 + 3) * 2 + 1
        assert_eq!(delegate.invocations(), 9);
    }

    #[tokio::test]
    async fn test_analyzer_overrides_affirmative_verdict() {
        let mut files = clean_app();
        files.retain(|(path, _)| *path != "src/pages/ProductsPage.tsx");
        files.push((
            "src/pages/ProductsPage.tsx",
            "export default function ProductsPage() {\n  return <div>TODO</div>\n}",
        ));
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let qloop = quality_loop(delegate.clone(), RuntimeBudget::unlimited(), 1, 1, files);
        let (quality, repair) = tasks();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;

        assert_eq!(outcome.gate.status, GateStatus::Failed);
        let last = outcome.last_check.unwrap();
        assert_eq!(last.delegate_verdict, DelegateVerdict::Affirmative);
        assert!(
            last.analyzer_issues
                .iter()
                .any(|i| i.category == IssueCategory::Placeholder)
        );
        assert_eq!(delegate.invocations(), 3);
    }

    #[tokio::test]
    async fn test_budget_stops_loop_between_phases() {
        let delegate = Arc::new(ScriptedDelegate::never_passing());
        let qloop = quality_loop(
            delegate.clone(),
            RuntimeBudget::unlimited().with_max_tool_calls(2),
            5,
            1,
            clean_app(),
        );
        let (quality, repair) = tasks();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;

        assert_eq!(delegate.invocations(), 2);
        assert_eq!(
            outcome.stop,
            LoopStop::BudgetExhausted(BudgetLimit::MaxToolCalls)
        );
        assert_eq!(outcome.gate.status, GateStatus::Failed);
        assert!(outcome.gate.summary.contains("budget exhausted (maxToolCalls)"));
    }

    #[tokio::test]
    async fn test_iteration_budget_counts_checks() {
        let delegate = Arc::new(ScriptedDelegate::never_passing());
        let qloop = quality_loop(
            delegate.clone(),
            RuntimeBudget::unlimited().with_max_iterations(2),
            5,
            1,
            clean_app(),
        );
        let (quality, repair) = tasks();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;
        assert_eq!(outcome.checks, 2);
        assert_eq!(
            outcome.stop,
            LoopStop::BudgetExhausted(BudgetLimit::MaxIterations)
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let qloop = quality_loop(delegate.clone(), RuntimeBudget::unlimited(), 2, 1, clean_app());
        let (quality, repair) = tasks();
        let ctx = run_ctx();
        ctx.cancel.cancel();
        let outcome = qloop.run(&ctx, &quality, &repair).await;

        assert_eq!(outcome.stop, LoopStop::Cancelled);
        assert!(outcome.gate.summary.contains("run cancelled"));
        assert_eq!(delegate.invocations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_check_is_cut_off_at_the_deadline() {
        let delegate = Arc::new(HangingQualityDelegate::default());
        let tracker = Arc::new(BudgetTracker::new(
            RuntimeBudget::unlimited().with_max_duration_ms(50),
        ));
        let qloop = QualityLoop::new(
            delegate.clone(),
            tracker.clone(),
            Arc::new(InMemoryArtifactStore::with_files(SESSION, clean_app())),
            ArtifactAnalyzer::default(),
            QualityLoopSettings::default(),
            Arc::new(CollectingEventSink::new()),
        )
        .with_cancel_grace(Duration::from_millis(100));
        let (quality, repair) = tasks();
        let started = Instant::now();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;

        assert_eq!(
            outcome.stop,
            LoopStop::BudgetExhausted(BudgetLimit::MaxDuration)
        );
        assert!(!outcome.gate.is_passed());
        assert!(outcome.gate.summary.contains("budget exhausted (maxDurationMs)"));
        assert_eq!(tracker.exhausted(), Some(BudgetLimit::MaxDuration));
        assert_eq!(delegate.checks.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_repair_results_reach_the_blackboard() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(1));
        let events = Arc::new(CollectingEventSink::new());
        let board = Arc::new(InMemoryBlackboard::new());
        let tracker = Arc::new(BudgetTracker::new(RuntimeBudget::unlimited()));
        let qloop = QualityLoop::new(
            delegate,
            tracker,
            Arc::new(InMemoryArtifactStore::with_files(SESSION, clean_app())),
            ArtifactAnalyzer::default(),
            QualityLoopSettings::default(),
            events.clone(),
        )
        .with_blackboard(board.clone());
        let (quality, repair) = tasks();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;
        assert!(outcome.gate.is_passed());

        let record_id = repair_record_id(0, 0);
        let patches = board.read(&patch_intents_key(&record_id)).unwrap();
        assert_eq!(patches[0]["filePath"], "src/repair-0.tsx");
        assert!(board.read(&format!("task_result/{record_id}")).is_some());
        assert_eq!(
            events.count(|e| matches!(
                e,
                OrchestrationEvent::PatchIntentProduced { task_id, .. } if task_id == "repair/0/0"
            )),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_session_fails_the_check() {
        let delegate = Arc::new(ScriptedDelegate::passing_after(0));
        let tracker = Arc::new(BudgetTracker::new(RuntimeBudget::unlimited()));
        let qloop = QualityLoop::new(
            delegate,
            tracker,
            Arc::new(InMemoryArtifactStore::new()),
            ArtifactAnalyzer::default(),
            QualityLoopSettings {
                max_rounds: 0,
                ..QualityLoopSettings::default()
            },
            Arc::new(CollectingEventSink::new()),
        );
        let (quality, repair) = tasks();
        let outcome = qloop.run(&run_ctx(), &quality, &repair).await;
        assert!(!outcome.gate.is_passed());
        assert!(
            outcome.last_check.unwrap().analyzer_issues[0]
                .message
                .starts_with("artifact tree unavailable")
        );
    }
}
