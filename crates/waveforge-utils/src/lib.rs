//! Shared foundations for waveforge: the plan and task data model, the error
//! taxonomy, exit codes, canonical JSON output and tracing setup.

pub mod canonicalization;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod types;

pub use error::{
    ArtifactStoreError, ConfigError, DelegateError, ErrorCategory, PlanError, UserFriendlyError,
    WaveforgeError,
};
pub use exit_codes::ExitCode;
pub use types::{
    AgentKind, ArtifactFile, BudgetLimit, BudgetUsage, ExecutionPlan, ExecutionPlanTask,
    PatchIntent, RawPlanTask, RuntimeBudget, TaskResult,
};
