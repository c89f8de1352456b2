//! End-to-end runs through `RunController` with a delegate that writes into the
//! session's artifact tree.
//!
//! The quality delegate in these tests always claims success, so the gate outcome is
//! decided by the analyzer over what the build and repair calls actually wrote.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

use waveforge::delegate::{
    DelegateContext, DelegateError, DelegateExecutor, DelegateOutput, InvocationPurpose,
};
use waveforge::orchestrator::blackboard::{patch_intents_key, repair_record_id, task_result_key};
use waveforge::orchestrator::events::CollectingEventSink;
use waveforge::orchestrator::{
    InMemoryArtifactStore, OrchestrationEvent, RunController, RunSettings, StopReason,
};
use waveforge::utils::ExitCode;
use waveforge::utils::types::{
    AgentKind, BudgetLimit, ExecutionPlan, ExecutionPlanTask, PatchIntent, RuntimeBudget,
};

const SESSION: &str = "shop";

const PACKAGE_JSON: &str = r#"{"type":"module","dependencies":{"react":"^18.3.0","react-dom":"^18.3.0","react-router-dom":"^6.26.0"}}"#;
const INDEX_HTML: &str =
    r#"<div id="root"></div><script type="module" src="/src/main.tsx"></script>"#;
const MAIN: &str = "import { createRoot } from 'react-dom/client'\nimport { BrowserRouter } from 'react-router-dom'\nimport App from './App'\ncreateRoot(document.getElementById('root')!).render(<BrowserRouter><App /></BrowserRouter>)";
const APP: &str = "import { Routes, Route } from 'react-router-dom'\nimport ProductsPage from './pages/ProductsPage'\nexport default function App() {\n  return <Routes><Route path=\"/products\" element={<ProductsPage />} /></Routes>\n}";
const PAGE_WITH_TODO: &str = "import { useState } from 'react'\nexport default function ProductsPage() {\n  const [q, setQ] = useState('')\n  return <div><input placeholder=\"Search\" value={q} onChange={e => setQ(e.target.value)} /><p>TODO: product grid</p></div>\n}";
const PAGE_FIXED: &str = "import { useState } from 'react'\nexport default function ProductsPage() {\n  const [q, setQ] = useState('')\n  return <div><input placeholder=\"Search\" value={q} onChange={e => setQ(e.target.value)} /></div>\n}";

/// Builds the shop app into an in-memory store. The page task leaves a TODO behind;
/// repairs replace it when `fixes_on_repair` is set.
struct ShopDelegate {
    store: Arc<InMemoryArtifactStore>,
    fixes_on_repair: bool,
    calls: AtomicU32,
}

impl ShopDelegate {
    fn new(store: Arc<InMemoryArtifactStore>, fixes_on_repair: bool) -> Self {
        Self {
            store,
            fixes_on_repair,
            calls: AtomicU32::new(0),
        }
    }

    async fn write(&self, path: &str, content: &str) -> PatchIntent {
        self.store.write_file(SESSION, path, content).await;
        PatchIntent::new(path, content)
    }
}

#[async_trait]
impl DelegateExecutor for ShopDelegate {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match ctx.purpose {
            InvocationPurpose::Task => {
                let mut output = DelegateOutput::succeeded();
                let files: &[(&str, &str)] = match task.id.as_str() {
                    "scaffold" => &[
                        ("package.json", PACKAGE_JSON),
                        ("index.html", INDEX_HTML),
                        ("src/main.tsx", MAIN),
                    ],
                    "products" => &[
                        ("src/App.tsx", APP),
                        ("src/pages/ProductsPage.tsx", PAGE_WITH_TODO),
                    ],
                    _ => &[],
                };
                for (path, content) in files {
                    output = output.with_patch(self.write(path, content).await);
                }
                Ok(output)
            }
            InvocationPurpose::Quality => {
                Ok(DelegateOutput::succeeded().with_response("Looks great. QUALITY_PASSED"))
            }
            InvocationPurpose::Repair => {
                assert!(!ctx.issues.is_empty(), "repair called without issues");
                if self.fixes_on_repair {
                    let patch = self.write("src/pages/ProductsPage.tsx", PAGE_FIXED).await;
                    return Ok(DelegateOutput::succeeded().with_patch(patch));
                }
                Ok(DelegateOutput::succeeded())
            }
        }
    }
}

fn shop_plan() -> ExecutionPlan {
    ExecutionPlan::new(
        "shop",
        vec![
            ExecutionPlanTask::new("scaffold", AgentKind::Scaffold, "vite skeleton"),
            ExecutionPlanTask::new("products", AgentKind::Page, "products page")
                .with_dependencies(["scaffold"]),
        ],
    )
}

fn setup(
    fixes_on_repair: bool,
    settings: RunSettings,
) -> (RunController, Arc<ShopDelegate>, Arc<CollectingEventSink>) {
    let store = Arc::new(InMemoryArtifactStore::with_files(
        SESSION,
        Vec::<(String, String)>::new(),
    ));
    let delegate = Arc::new(ShopDelegate::new(Arc::clone(&store), fixes_on_repair));
    let events = Arc::new(CollectingEventSink::new());
    let controller = RunController::new(delegate.clone(), store, settings).with_events(events.clone());
    (controller, delegate, events)
}

#[tokio::test]
async fn test_analyzer_rejects_claimed_success_until_repaired() {
    let (mut controller, delegate, events) = setup(true, RunSettings::default());
    let outcome = controller
        .run(&shop_plan(), SESSION, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.success, "{}", outcome.quality_gate.summary);
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    // two build tasks, then check, repair, check
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 5);
    assert_eq!(outcome.delegate_invocations, 5);
    assert!(outcome.quality_gate.summary.contains("after 1 repair round(s)"));

    let verdicts: Vec<bool> = events
        .events()
        .iter()
        .filter_map(|e| match e {
            OrchestrationEvent::QualityCheckCompleted { passed, .. } => Some(*passed),
            _ => None,
        })
        .collect();
    assert_eq!(verdicts, vec![false, true]);
    // five from the build tasks, one from the repair
    assert_eq!(
        events.count(|e| matches!(e, OrchestrationEvent::PatchIntentProduced { .. })),
        6
    );

    let board = controller.blackboard();
    let patches = board
        .read(&patch_intents_key("products"))
        .expect("patch intents recorded");
    assert_eq!(patches.as_array().map(Vec::len), Some(2));
    let repair_patches = board
        .read(&patch_intents_key(&repair_record_id(0, 0)))
        .expect("repair patch recorded");
    assert_eq!(repair_patches[0]["filePath"], "src/pages/ProductsPage.tsx");
}

#[tokio::test]
async fn test_unrepaired_placeholder_fails_after_all_rounds() {
    let (mut controller, delegate, _) = setup(false, RunSettings::default());
    let outcome = controller
        .run(&shop_plan(), SESSION, CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.stop_reason, StopReason::QualityGateFailed);
    assert_eq!(outcome.exit_code(), ExitCode::QUALITY_GATE_FAILED);
    // two build tasks, then 2 * 2 + 1 quality/repair calls
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 7);
    assert_eq!(outcome.unresolved_issues.len(), 1);
    assert!(
        outcome.unresolved_issues[0].starts_with("[placeholder] src/pages/ProductsPage.tsx"),
        "{:?}",
        outcome.unresolved_issues
    );
    assert!(outcome.quality_gate.summary.contains("repair rounds exhausted"));

    let board = controller.blackboard();
    for (round, attempt) in [(0, 0), (1, 0)] {
        let id = repair_record_id(round, attempt);
        assert!(board.read(&task_result_key(&id)).is_some(), "{id}");
        assert!(board.read(&patch_intents_key(&id)).is_none(), "{id}");
    }
}

#[tokio::test]
async fn test_repair_rounds_setting_bounds_the_loop() {
    for (rounds, expected_calls) in [(0, 3), (1, 5), (3, 9)] {
        let settings = RunSettings::default().with_max_repair_rounds(rounds);
        let (mut controller, delegate, _) = setup(false, settings);
        let outcome = controller
            .run(&shop_plan(), SESSION, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.stop_reason, StopReason::QualityGateFailed);
        assert_eq!(
            delegate.calls.load(Ordering::SeqCst),
            expected_calls,
            "max_repair_rounds = {rounds}"
        );
    }
}

#[tokio::test]
async fn test_iteration_budget_stops_before_quality_gate() {
    // Two waves use both iterations; the first quality check is denied
    let settings =
        RunSettings::default().with_budget(RuntimeBudget::unlimited().with_max_iterations(2));
    let (mut controller, delegate, events) = setup(true, settings);
    let outcome = controller
        .run(&shop_plan(), SESSION, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.stop_reason, StopReason::BudgetExhausted);
    assert_eq!(outcome.budget_stop_reason, Some(BudgetLimit::MaxIterations));
    assert_eq!(outcome.exit_code(), ExitCode::BUDGET_EXHAUSTED);
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcome.waves_executed, 2);
    assert!(
        outcome
            .unresolved_issues
            .iter()
            .any(|i| i == "budget exhausted: maxIterations limit reached (2 of 2)"),
        "{:?}",
        outcome.unresolved_issues
    );
    assert_eq!(
        events.count(|e| matches!(e, OrchestrationEvent::BudgetExhausted { .. })),
        1
    );
}

#[tokio::test]
async fn test_controller_is_reusable_across_runs() {
    let settings =
        RunSettings::default().with_budget(RuntimeBudget::unlimited().with_max_tool_calls(10));
    let (mut controller, _, _) = setup(true, settings);
    let first = controller
        .run(&shop_plan(), SESSION, CancellationToken::new())
        .await
        .unwrap();
    let second = controller
        .run(&shop_plan(), SESSION, CancellationToken::new())
        .await
        .unwrap();

    assert!(first.success);
    assert!(second.success);
    assert_ne!(first.run_id, second.run_id);
    // Budget counters start over for every run
    assert_eq!(first.budget_usage.tool_calls_used, 5);
    assert!(second.budget_usage.tool_calls_used <= 5);
}
