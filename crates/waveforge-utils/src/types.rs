//! Core data model shared by the waveforge crates
//!
//! Plans, tasks and task results cross the boundary to the planning step and the
//! delegates, so they serialize with camelCase keys (`agentId`, `dependsOn`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr, VariantNames};

/// Tool names understood by the delegate sandbox.
pub mod tools {
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_FILE: &str = "write_file";
    pub const LIST_FILES: &str = "list_files";
    pub const GREP: &str = "grep";
    pub const RUN_COMMAND: &str = "run_command";
}

/// The fixed set of task kinds a plan may contain.
///
/// Each kind carries a static tool allow-list; requested tools outside the list are
/// dropped during plan normalization.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AgentKind {
    /// Project skeleton: package manifest, build config, entry module
    Scaffold,
    /// Page-level components and routes
    Page,
    /// State stores and data flow
    State,
    /// Design tokens and styling
    Style,
    /// Event handlers, forms and interactive behavior
    Interaction,
    /// Quality review of the produced artifact tree
    Quality,
    /// Repair of issues reported by the quality check
    Repair,
}

const SCAFFOLD_TOOLS: &[&str] = &[
    tools::READ_FILE,
    tools::WRITE_FILE,
    tools::LIST_FILES,
    tools::RUN_COMMAND,
];
const BUILD_TOOLS: &[&str] = &[
    tools::READ_FILE,
    tools::WRITE_FILE,
    tools::LIST_FILES,
    tools::GREP,
];
const STYLE_TOOLS: &[&str] = &[tools::READ_FILE, tools::WRITE_FILE, tools::LIST_FILES];
const QUALITY_TOOLS: &[&str] = &[
    tools::READ_FILE,
    tools::LIST_FILES,
    tools::GREP,
    tools::RUN_COMMAND,
];
const REPAIR_TOOLS: &[&str] = &[
    tools::READ_FILE,
    tools::WRITE_FILE,
    tools::LIST_FILES,
    tools::GREP,
    tools::RUN_COMMAND,
];

impl AgentKind {
    /// Every task kind, in pipeline order.
    pub const ALL: [AgentKind; 7] = [
        AgentKind::Scaffold,
        AgentKind::Page,
        AgentKind::State,
        AgentKind::Style,
        AgentKind::Interaction,
        AgentKind::Quality,
        AgentKind::Repair,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Full tool allow-list for this kind.
    #[must_use]
    pub fn default_tools(self) -> &'static [&'static str] {
        match self {
            Self::Scaffold => SCAFFOLD_TOOLS,
            Self::Page | Self::State | Self::Interaction => BUILD_TOOLS,
            Self::Style => STYLE_TOOLS,
            Self::Quality => QUALITY_TOOLS,
            Self::Repair => REPAIR_TOOLS,
        }
    }

    #[must_use]
    pub fn allows_tool(self, tool: &str) -> bool {
        self.default_tools().contains(&tool)
    }

    /// Quality and repair tasks are driven by the quality/repair loop rather than
    /// dispatched as build tasks.
    #[must_use]
    pub fn is_gate_kind(self) -> bool {
        matches!(self, Self::Quality | Self::Repair)
    }

    /// Filter requested tools against the allow-list.
    ///
    /// Returns `(kept, dropped)`. When nothing survives the filter the full default
    /// allow-list is substituted, so the kept list is never empty.
    #[must_use]
    pub fn filter_tools(self, requested: &[String]) -> (Vec<String>, Vec<String>) {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for tool in requested {
            if self.allows_tool(tool) {
                if !kept.contains(tool) {
                    kept.push(tool.clone());
                }
            } else {
                dropped.push(tool.clone());
            }
        }
        if kept.is_empty() {
            kept = self.default_tools().iter().map(|t| (*t).to_string()).collect();
        }
        (kept, dropped)
    }
}

/// A task exactly as the planning step returned it, before normalization.
///
/// Accepts both snake_case and camelCase keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPlanTask {
    pub id: String,
    #[serde(alias = "agentId")]
    pub agent_id: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

/// One unit of delegated work inside an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlanTask {
    pub id: String,
    pub agent_id: AgentKind,
    pub goal: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ExecutionPlanTask {
    /// Create a task with no dependencies and the kind's full tool allow-list.
    #[must_use]
    pub fn new(id: impl Into<String>, agent_id: AgentKind, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_id,
            goal: goal.into(),
            depends_on: Vec::new(),
            tools: agent_id
                .default_tools()
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }
}

/// The task graph for one run. Immutable once produced by the planning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<ExecutionPlanTask>,
}

impl ExecutionPlan {
    #[must_use]
    pub fn new(id: impl Into<String>, tasks: Vec<ExecutionPlanTask>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            tasks,
        }
    }

    #[must_use]
    pub fn task(&self, id: &str) -> Option<&ExecutionPlanTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// First task of the given kind, if the plan has one.
    #[must_use]
    pub fn first_of_kind(&self, kind: AgentKind) -> Option<&ExecutionPlanTask> {
        self.tasks.iter().find(|t| t.agent_id == kind)
    }
}

/// A proposed file mutation emitted by a delegate.
///
/// The orchestrator counts and forwards these; it never interprets the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchIntent {
    pub file_path: String,
    pub content: String,
    /// BLAKE3 hex digest of `content`
    pub content_hash: String,
}

impl PatchIntent {
    #[must_use]
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = blake3::hash(content.as_bytes()).to_hex().to_string();
        Self {
            file_path: file_path.into(),
            content,
            content_hash,
        }
    }
}

/// Outcome of one executed task. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub agent_id: AgentKind,
    pub success: bool,
    #[serde(default)]
    pub patch_intents: Vec<PatchIntent>,
    #[serde(default)]
    pub touched_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

impl TaskResult {
    /// A failed result for a task whose delegate call errored.
    #[must_use]
    pub fn failed(task: &ExecutionPlanTask, error: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            agent_id: task.agent_id,
            success: false,
            patch_intents: Vec::new(),
            touched_files: Vec::new(),
            error: Some(error.into()),
            response_text: None,
        }
    }
}

/// A single file of the artifact tree as the artifact store reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub content: String,
}

impl ArtifactFile {
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Which configured ceiling stopped a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BudgetLimit {
    #[serde(rename = "maxToolCalls")]
    #[strum(serialize = "maxToolCalls")]
    MaxToolCalls,
    #[serde(rename = "maxIterations")]
    #[strum(serialize = "maxIterations")]
    MaxIterations,
    #[serde(rename = "maxDurationMs")]
    #[strum(serialize = "maxDurationMs")]
    MaxDuration,
}

/// Configured limits for one run. Every field is optional; `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeBudget {
    #[serde(default, alias = "maxIterations")]
    pub max_iterations: Option<u32>,
    #[serde(default, alias = "maxToolCalls")]
    pub max_tool_calls: Option<u32>,
    #[serde(default, alias = "maxDurationMs")]
    pub max_duration_ms: Option<u64>,
    #[serde(default, alias = "targetScore")]
    pub target_score: Option<f64>,
}

impl RuntimeBudget {
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = Some(max);
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    #[must_use]
    pub fn with_max_duration_ms(mut self, max: u64) -> Self {
        self.max_duration_ms = Some(max);
        self
    }
}

/// Consumed counters against a [`RuntimeBudget`], snapshotted for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetUsage {
    pub tool_calls_used: u32,
    pub tool_calls_denied: u32,
    pub iterations_used: u32,
    pub elapsed_ms: u64,
    pub limits: RuntimeBudget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhausted: Option<BudgetLimit>,
}

impl BudgetUsage {
    /// Consumed and available counts for the given limit, as `(used, max)`.
    #[must_use]
    pub fn counts_for(&self, limit: BudgetLimit) -> (u64, Option<u64>) {
        match limit {
            BudgetLimit::MaxToolCalls => (
                u64::from(self.tool_calls_used),
                self.limits.max_tool_calls.map(u64::from),
            ),
            BudgetLimit::MaxIterations => (
                u64::from(self.iterations_used),
                self.limits.max_iterations.map(u64::from),
            ),
            BudgetLimit::MaxDuration => (self.elapsed_ms, self.limits.max_duration_ms),
        }
    }
}
