use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Default number of quality/repair rounds
pub const DEFAULT_MAX_REPAIR_ROUNDS: u32 = 2;
/// Default repair delegate calls per round
pub const DEFAULT_REPAIR_ATTEMPTS_PER_ROUND: u32 = 1;
/// Default per-wave worker bound
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default grace period for cooperative cancellation before tasks are aborted
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 5_000;
pub const DEFAULT_GATE_NAME: &str = "artifact-quality";
pub const DEFAULT_PASS_TOKEN: &str = "QUALITY_PASSED";
pub const DEFAULT_FAIL_TOKEN: &str = "QUALITY_FAILED";

/// Where a resolved configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    /// Command-line flag (highest precedence)
    Cli,
    /// Value set through `Config::builder()`
    Programmatic,
    /// `WAVEFORGE_*` environment variable
    Env,
    /// Configuration file
    Config,
    /// Built-in default (lowest precedence)
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Programmatic => write!(f, "programmatic"),
            Self::Env => write!(f, "env"),
            Self::Config => write!(f, "config"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Resolved waveforge configuration.
///
/// Values are layered with precedence CLI/programmatic > environment > config file >
/// built-in defaults, and every resolved key records its [`ConfigSource`].
///
/// ```toml
/// [budget]
/// max_tool_calls = 40
/// max_duration_ms = 600000
///
/// [repair]
/// max_rounds = 2
/// attempts_per_round = 1
///
/// [quality]
/// gate_name = "artifact-quality"
///
/// [execution]
/// max_concurrency = 8
///
/// [analyzer]
/// extra_generic_routes = ["pricing"]
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub budget: BudgetConfig,
    pub repair: RepairConfig,
    pub quality: QualityConfig,
    pub execution: ExecutionConfig,
    pub analyzer: AnalyzerConfig,
    pub logging: LoggingConfig,
    /// Source attribution for each setting (for `waveforge config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

/// `[budget]` run ceilings. Unset means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct BudgetConfig {
    pub max_tool_calls: Option<u32>,
    pub max_iterations: Option<u32>,
    pub max_duration_ms: Option<u64>,
    /// Carried through to reports; not enforced.
    pub target_score: Option<f64>,
}

/// `[repair]` quality/repair loop bounds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepairConfig {
    pub max_rounds: Option<u32>,
    pub attempts_per_round: Option<u32>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_rounds: Some(DEFAULT_MAX_REPAIR_ROUNDS),
            attempts_per_round: Some(DEFAULT_REPAIR_ATTEMPTS_PER_ROUND),
        }
    }
}

/// `[quality]` gate naming and verdict tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QualityConfig {
    pub gate_name: Option<String>,
    pub pass_token: Option<String>,
    pub fail_token: Option<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            gate_name: Some(DEFAULT_GATE_NAME.to_string()),
            pass_token: Some(DEFAULT_PASS_TOKEN.to_string()),
            fail_token: Some(DEFAULT_FAIL_TOKEN.to_string()),
        }
    }
}

/// `[execution]` wave dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExecutionConfig {
    pub max_concurrency: Option<usize>,
    pub cancel_grace_ms: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Some(DEFAULT_MAX_CONCURRENCY),
            cancel_grace_ms: Some(DEFAULT_CANCEL_GRACE_MS),
        }
    }
}

/// `[analyzer]` overrides for the artifact quality analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    /// Explicit entry module, relative to the artifact root
    pub entry: Option<String>,
    /// Route paths treated as generic in addition to the built-in set
    #[serde(default)]
    pub extra_generic_routes: Vec<String>,
}

/// `[logging]` output options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub verbose: Option<bool>,
    pub json: Option<bool>,
}
