use std::fmt;
use thiserror::Error;

use crate::types::BudgetLimit;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `WaveforgeError` only surfaces for failures that happen *before* a run starts
/// (bad configuration, an invalid plan, unreadable inputs). Once a run is dispatched,
/// delegate failures, quality exhaustion, budget exhaustion and cancellation are all
/// reported inside the run outcome instead.
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Config` | Configuration file, environment or CLI argument errors |
/// | `Plan` | Structural plan errors (duplicates, dangling references, cycles) |
/// | `Delegate` | Delegate invocation failures |
/// | `ArtifactStore` | Artifact tree could not be listed |
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes and
/// [`display_for_user()`](Self::display_for_user) for formatted messages.
#[derive(Error, Debug)]
pub enum WaveforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Delegate error: {0}")]
    Delegate(#[from] DelegateError),

    #[error("Artifact store error: {0}")]
    ArtifactStore(#[from] ArtifactStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Plan,
    Delegate,
    Artifacts,
    ResourceLimits,
    Cancellation,
    FileSystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Plan => write!(f, "Plan"),
            Self::Delegate => write!(f, "Delegate"),
            Self::Artifacts => write!(f, "Artifacts"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Cancellation => write!(f, "Cancellation"),
            Self::FileSystem => write!(f, "File System"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration validation failed: {}", .errors.join("; "))]
    ValidationFailed { errors: Vec<String> },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::ValidationFailed { errors } => format!(
                "Configuration validation failed with {} error(s): {}",
                errors.len(),
                errors.join(", ")
            ),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "Configuration files must be valid TOML with [budget], [repair], [quality], [execution] and [analyzer] sections."
                    .to_string(),
            ),
            Self::InvalidValue { key, .. } => Some(format!(
                "The '{key}' option has specific format requirements."
            )),
            Self::NotFound { .. } => None,
            Self::ValidationFailed { .. } => {
                Some("Some values passed parsing but are outside their allowed range.".to_string())
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .waveforge/config.toml".to_string(),
                "Run 'waveforge config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { .. } | Self::ValidationFailed { .. } => vec![
                "Fix the reported value in the config file or environment".to_string(),
                "Unset WAVEFORGE_* environment variables to fall back to the file".to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Pass an existing file with --config".to_string(),
                "Omit --config to use discovery".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// A dependency that names a task not present in the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingDependency {
    pub task_id: String,
    pub missing: String,
}

impl fmt::Display for DanglingDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.task_id, self.missing)
    }
}

/// A task whose kind is outside the fixed enumerated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAgentKind {
    pub task_id: String,
    pub agent_id: String,
}

impl fmt::Display for UnknownAgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.task_id, self.agent_id)
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Structural plan errors. Always fatal and raised before any task is dispatched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Duplicate task ids: {}", .ids.join(", "))]
    DuplicateTaskIds { ids: Vec<String> },

    #[error("Dangling dependencies: {}", join_display(.refs))]
    DanglingDependencies { refs: Vec<DanglingDependency> },

    #[error("Unknown task kinds: {}", join_display(.entries))]
    UnknownAgentKinds { entries: Vec<UnknownAgentKind> },

    #[error("Dependency cycle among tasks: {}", .task_ids.join(", "))]
    Cycle { task_ids: Vec<String> },

    #[error("Malformed plan: {0}")]
    Malformed(String),
}

impl PlanError {
    /// Ids of every task the error is about.
    #[must_use]
    pub fn offending_ids(&self) -> Vec<String> {
        match self {
            Self::DuplicateTaskIds { ids } => ids.clone(),
            Self::DanglingDependencies { refs } => {
                refs.iter().map(|r| r.task_id.clone()).collect()
            }
            Self::UnknownAgentKinds { entries } => {
                entries.iter().map(|e| e.task_id.clone()).collect()
            }
            Self::Cycle { task_ids } => task_ids.clone(),
            Self::Malformed(_) => Vec::new(),
        }
    }
}

impl UserFriendlyError for PlanError {
    fn user_message(&self) -> String {
        match self {
            Self::DuplicateTaskIds { ids } => {
                format!("The plan reuses task ids: {}", ids.join(", "))
            }
            Self::DanglingDependencies { refs } => format!(
                "The plan depends on tasks that do not exist: {}",
                join_display(refs)
            ),
            Self::UnknownAgentKinds { entries } => format!(
                "The plan uses unknown task kinds: {}",
                join_display(entries)
            ),
            Self::Cycle { task_ids } => format!(
                "The plan contains a dependency cycle involving: {}",
                task_ids.join(", ")
            ),
            Self::Malformed(reason) => format!("The plan could not be read: {reason}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Plans are validated before any task is dispatched; nothing was executed.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::UnknownAgentKinds { .. } => vec![
                "Use one of: scaffold, page, state, style, interaction, quality, repair"
                    .to_string(),
            ],
            Self::Cycle { .. } => vec![
                "Remove one dependency edge from each listed cycle".to_string(),
                "Run 'waveforge schedule' to inspect the wave grouping".to_string(),
            ],
            _ => vec!["Regenerate the plan or fix the listed task ids".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Plan
    }
}

/// Failures of a single delegate invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelegateError {
    /// The delegate could not be reached or its transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The delegate did not answer in time
    #[error("Timeout after {duration_ms} ms")]
    Timeout { duration_ms: u64 },

    /// The delegate observed the cancellation signal
    #[error("Delegate call cancelled")]
    Cancelled,

    /// The run budget denied this invocation before it was dispatched
    #[error("Budget exceeded: {limit} reached ({used} used, limit {max})")]
    BudgetExceeded {
        limit: BudgetLimit,
        used: u64,
        max: u64,
    },

    /// The delegate refused or could not carry out the task
    #[error("Delegate rejected the task: {0}")]
    Rejected(String),

    /// The delegate task panicked or was aborted by the runtime
    #[error("Delegate task aborted: {0}")]
    Aborted(String),
}

impl DelegateError {
    #[must_use]
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. })
    }
}

impl UserFriendlyError for DelegateError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Delegate transport error: {msg}"),
            Self::Timeout { duration_ms } => {
                format!("Delegate invocation timed out after {duration_ms} ms")
            }
            Self::Cancelled => "Delegate invocation was cancelled".to_string(),
            Self::BudgetExceeded { limit, used, max } => {
                format!("Run budget exceeded: {limit} reached ({used} of {max})")
            }
            Self::Rejected(msg) => format!("Delegate rejected the task: {msg}"),
            Self::Aborted(msg) => format!("Delegate task aborted: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::BudgetExceeded { .. } => {
                Some("Budget limits stop looping delegates from running forever.".to_string())
            }
            Self::Cancelled => Some("The run's cancellation signal fired.".to_string()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::BudgetExceeded { .. } => vec![
                "Raise [budget] limits in .waveforge/config.toml".to_string(),
                "Override with WAVEFORGE_MAX_TOOL_CALLS for a single run".to_string(),
            ],
            Self::Timeout { .. } => vec!["Raise [budget] max_duration_ms".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::BudgetExceeded { .. } | Self::Timeout { .. } => ErrorCategory::ResourceLimits,
            Self::Cancelled => ErrorCategory::Cancellation,
            _ => ErrorCategory::Delegate,
        }
    }
}

/// Failures listing the artifact tree of a session.
#[derive(Error, Debug)]
pub enum ArtifactStoreError {
    #[error("Unknown session '{session_id}'")]
    UnknownSession { session_id: String },

    #[error("Failed to read artifact tree at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact store unavailable: {0}")]
    Unavailable(String),
}

impl UserFriendlyError for ArtifactStoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("The quality gate reads the artifact tree after every wave and repair round.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Io { .. } => vec!["Check that the artifact directory exists and is readable".to_string()],
            _ => Vec::new(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::FileSystem,
            _ => ErrorCategory::Artifacts,
        }
    }
}

impl UserFriendlyError for WaveforgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Plan(e) => e.user_message(),
            Self::Delegate(e) => e.user_message(),
            Self::ArtifactStore(e) => e.user_message(),
            Self::Io(e) => format!("File system error: {e}"),
            Self::Json(e) => format!("Invalid JSON: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Plan(e) => e.context(),
            Self::Delegate(e) => e.context(),
            Self::ArtifactStore(e) => e.context(),
            Self::Io(_) | Self::Json(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Plan(e) => e.suggestions(),
            Self::Delegate(e) => e.suggestions(),
            Self::ArtifactStore(e) => e.suggestions(),
            Self::Io(_) => vec!["Check file paths and permissions".to_string()],
            Self::Json(_) => vec!["Validate the input with a JSON linter".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Plan(e) => e.category(),
            Self::Delegate(e) => e.category(),
            Self::ArtifactStore(e) => e.category(),
            Self::Io(_) => ErrorCategory::FileSystem,
            Self::Json(_) => ErrorCategory::Configuration,
        }
    }
}

impl WaveforgeError {
    /// Format the error with its category, context and suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut out = format!("[{}] {}", self.category(), self.user_message());
        if let Some(context) = self.context() {
            out.push_str("\n  ");
            out.push_str(&context);
        }
        for suggestion in self.suggestions() {
            out.push_str("\n  - ");
            out.push_str(&suggestion);
        }
        out
    }
}
