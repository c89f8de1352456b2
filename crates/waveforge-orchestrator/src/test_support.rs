//! Fixtures shared by the orchestrator unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use waveforge_delegate::{DelegateContext, DelegateExecutor, DelegateOutput, InvocationPurpose};
use waveforge_utils::error::DelegateError;
use waveforge_utils::types::{ExecutionPlanTask, PatchIntent};

pub const SESSION: &str = "session-1";

/// A small routed app the analyzer accepts without issues.
pub fn clean_app() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "package.json",
            r#"{"type":"module","dependencies":{"react":"^18.3.0","react-dom":"^18.3.0","react-router-dom":"^6.26.0"}}"#,
        ),
        (
            "index.html",
            r#"<div id="root"></div><script type="module" src="/src/main.tsx"></script>"#,
        ),
        (
            "src/main.tsx",
            "import { createRoot } from 'react-dom/client'\nimport { BrowserRouter } from 'react-router-dom'\nimport App from './App'\ncreateRoot(document.getElementById('root')!).render(<BrowserRouter><App /></BrowserRouter>)",
        ),
        (
            "src/App.tsx",
            "import { Routes, Route } from 'react-router-dom'\nimport ProductsPage from './pages/ProductsPage'\nexport default function App() {\n  return <Routes><Route path=\"/products\" element={<ProductsPage />} /></Routes>\n}",
        ),
        (
            "src/pages/ProductsPage.tsx",
            "import { useState } from 'react'\nexport default function ProductsPage() {\n  const [q, setQ] = useState('')\n  return <div><input placeholder=\"Search\" value={q} onChange={e => setQ(e.target.value)} /></div>\n}",
        ),
    ]
}

/// Task calls succeed unless the task id starts with `fail`. Quality checks answer
/// `QUALITY_PASSED` once `pass_after_repairs` repairs have happened, `QUALITY_FAILED`
/// before that (or forever when `None`). Repair `n` writes `src/repair-n.tsx`.
#[derive(Debug, Default)]
pub struct ScriptedDelegate {
    pub pass_after_repairs: Option<u32>,
    pub tasks: AtomicU32,
    pub checks: AtomicU32,
    pub repairs: AtomicU32,
}

impl ScriptedDelegate {
    pub fn passing_after(repairs: u32) -> Self {
        Self {
            pass_after_repairs: Some(repairs),
            ..Self::default()
        }
    }

    pub fn never_passing() -> Self {
        Self::default()
    }

    pub fn invocations(&self) -> u32 {
        self.tasks.load(Ordering::SeqCst)
            + self.checks.load(Ordering::SeqCst)
            + self.repairs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DelegateExecutor for ScriptedDelegate {
    async fn execute(
        &self,
        task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        match ctx.purpose {
            InvocationPurpose::Task => {
                self.tasks.fetch_add(1, Ordering::SeqCst);
                if task.id.starts_with("fail") {
                    return Err(DelegateError::Transport("upstream 503".to_string()));
                }
                Ok(DelegateOutput::succeeded())
            }
            InvocationPurpose::Quality => {
                self.checks.fetch_add(1, Ordering::SeqCst);
                let repairs = self.repairs.load(Ordering::SeqCst);
                let passes = self.pass_after_repairs.is_some_and(|k| repairs >= k);
                let token = if passes { "QUALITY_PASSED" } else { "QUALITY_FAILED" };
                Ok(DelegateOutput::succeeded().with_response(token))
            }
            InvocationPurpose::Repair => {
                let n = self.repairs.fetch_add(1, Ordering::SeqCst);
                Ok(DelegateOutput::succeeded()
                    .with_patch(PatchIntent::new(format!("src/repair-{n}.tsx"), "fixed")))
            }
        }
    }
}

/// Task calls and repairs return at once; a quality check sleeps for an hour, ignoring
/// cancellation, before claiming success.
#[derive(Debug, Default)]
pub struct HangingQualityDelegate {
    pub checks: AtomicU32,
}

#[async_trait]
impl DelegateExecutor for HangingQualityDelegate {
    async fn execute(
        &self,
        _task: &ExecutionPlanTask,
        ctx: DelegateContext,
    ) -> Result<DelegateOutput, DelegateError> {
        if ctx.purpose == InvocationPurpose::Quality {
            self.checks.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(DelegateOutput::succeeded().with_response("QUALITY_PASSED"));
        }
        Ok(DelegateOutput::succeeded())
    }
}
