use std::path::PathBuf;

/// Command-line overrides applied on top of the environment and config file.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file, bypassing discovery
    pub config_path: Option<PathBuf>,
    pub max_tool_calls: Option<u32>,
    pub max_iterations: Option<u32>,
    pub max_duration_ms: Option<u64>,
    pub max_repair_rounds: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub entry: Option<String>,
    pub verbose: Option<bool>,
    pub log_json: Option<bool>,
}
