use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use super::{
    AnalyzerConfig, BudgetConfig, CliArgs, Config, ConfigSource, ExecutionConfig, LoggingConfig,
    QualityConfig, RepairConfig,
};

pub const ENV_HOME: &str = "WAVEFORGE_HOME";
pub const ENV_MAX_TOOL_CALLS: &str = "WAVEFORGE_MAX_TOOL_CALLS";
pub const ENV_MAX_REPAIR_ROUNDS: &str = "WAVEFORGE_MAX_REPAIR_ROUNDS";
pub const ENV_MAX_DURATION_MS: &str = "WAVEFORGE_MAX_DURATION_MS";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    budget: Option<BudgetConfig>,
    repair: Option<RepairConfig>,
    quality: Option<QualityConfig>,
    execution: Option<ExecutionConfig>,
    analyzer: Option<AnalyzerConfig>,
    logging: Option<LoggingConfig>,
}

/// Read a numeric override from the environment.
///
/// Unset, empty and unparsable values return `None` so the next layer applies.
fn env_override<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<T>() {
        Ok(value) => {
            debug!(key, value = trimmed, "Using environment override");
            Some(value)
        }
        Err(_) => {
            warn!(key, value = trimmed, "Ignoring invalid environment override");
            None
        }
    }
}

pub(crate) fn default_attribution() -> HashMap<String, ConfigSource> {
    [
        "max_repair_rounds",
        "repair_attempts_per_round",
        "gate_name",
        "pass_token",
        "fail_token",
        "max_concurrency",
        "cancel_grace_ms",
    ]
    .into_iter()
    .map(|key| (key.to_string(), ConfigSource::Default))
    .collect()
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for discovery when no explicit path is given.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid depending on the process cwd.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self {
            budget: BudgetConfig::default(),
            repair: RepairConfig::default(),
            quality: QualityConfig::default(),
            execution: ExecutionConfig::default(),
            analyzer: AnalyzerConfig::default(),
            logging: LoggingConfig::default(),
            source_attribution: default_attribution(),
        };

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(waveforge_utils::ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            debug!(path = %path.display(), "Loaded config file");
            config.apply_file(file_config);
        }

        config.apply_env();
        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let src = ConfigSource::Config;
        let attr = &mut self.source_attribution;

        if let Some(budget) = file.budget {
            if budget.max_tool_calls.is_some() {
                self.budget.max_tool_calls = budget.max_tool_calls;
                attr.insert("max_tool_calls".to_string(), src.clone());
            }
            if budget.max_iterations.is_some() {
                self.budget.max_iterations = budget.max_iterations;
                attr.insert("max_iterations".to_string(), src.clone());
            }
            if budget.max_duration_ms.is_some() {
                self.budget.max_duration_ms = budget.max_duration_ms;
                attr.insert("max_duration_ms".to_string(), src.clone());
            }
            if budget.target_score.is_some() {
                self.budget.target_score = budget.target_score;
                attr.insert("target_score".to_string(), src.clone());
            }
        }

        if let Some(repair) = file.repair {
            if repair.max_rounds.is_some() {
                self.repair.max_rounds = repair.max_rounds;
                attr.insert("max_repair_rounds".to_string(), src.clone());
            }
            if repair.attempts_per_round.is_some() {
                self.repair.attempts_per_round = repair.attempts_per_round;
                attr.insert("repair_attempts_per_round".to_string(), src.clone());
            }
        }

        if let Some(quality) = file.quality {
            if quality.gate_name.is_some() {
                self.quality.gate_name = quality.gate_name;
                attr.insert("gate_name".to_string(), src.clone());
            }
            if quality.pass_token.is_some() {
                self.quality.pass_token = quality.pass_token;
                attr.insert("pass_token".to_string(), src.clone());
            }
            if quality.fail_token.is_some() {
                self.quality.fail_token = quality.fail_token;
                attr.insert("fail_token".to_string(), src.clone());
            }
        }

        if let Some(execution) = file.execution {
            if execution.max_concurrency.is_some() {
                self.execution.max_concurrency = execution.max_concurrency;
                attr.insert("max_concurrency".to_string(), src.clone());
            }
            if execution.cancel_grace_ms.is_some() {
                self.execution.cancel_grace_ms = execution.cancel_grace_ms;
                attr.insert("cancel_grace_ms".to_string(), src.clone());
            }
        }

        if let Some(analyzer) = file.analyzer {
            if analyzer.entry.is_some() {
                self.analyzer.entry = analyzer.entry;
                attr.insert("analyzer_entry".to_string(), src.clone());
            }
            if !analyzer.extra_generic_routes.is_empty() {
                self.analyzer.extra_generic_routes = analyzer.extra_generic_routes;
                attr.insert("extra_generic_routes".to_string(), src.clone());
            }
        }

        if let Some(logging) = file.logging {
            if logging.verbose.is_some() {
                self.logging.verbose = logging.verbose;
                attr.insert("verbose".to_string(), src.clone());
            }
            if logging.json.is_some() {
                self.logging.json = logging.json;
                attr.insert("log_json".to_string(), src);
            }
        }
    }

    fn apply_env(&mut self) {
        if let Some(max) = env_override::<u32>(ENV_MAX_TOOL_CALLS) {
            self.budget.max_tool_calls = Some(max);
            self.source_attribution
                .insert("max_tool_calls".to_string(), ConfigSource::Env);
        }
        if let Some(rounds) = env_override::<u32>(ENV_MAX_REPAIR_ROUNDS) {
            self.repair.max_rounds = Some(rounds);
            self.source_attribution
                .insert("max_repair_rounds".to_string(), ConfigSource::Env);
        }
        if let Some(ms) = env_override::<u64>(ENV_MAX_DURATION_MS) {
            self.budget.max_duration_ms = Some(ms);
            self.source_attribution
                .insert("max_duration_ms".to_string(), ConfigSource::Env);
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let attr = &mut self.source_attribution;
        if let Some(max) = cli.max_tool_calls {
            self.budget.max_tool_calls = Some(max);
            attr.insert("max_tool_calls".to_string(), ConfigSource::Cli);
        }
        if let Some(max) = cli.max_iterations {
            self.budget.max_iterations = Some(max);
            attr.insert("max_iterations".to_string(), ConfigSource::Cli);
        }
        if let Some(ms) = cli.max_duration_ms {
            self.budget.max_duration_ms = Some(ms);
            attr.insert("max_duration_ms".to_string(), ConfigSource::Cli);
        }
        if let Some(rounds) = cli.max_repair_rounds {
            self.repair.max_rounds = Some(rounds);
            attr.insert("max_repair_rounds".to_string(), ConfigSource::Cli);
        }
        if let Some(workers) = cli.max_concurrency {
            self.execution.max_concurrency = Some(workers);
            attr.insert("max_concurrency".to_string(), ConfigSource::Cli);
        }
        if let Some(entry) = &cli.entry {
            self.analyzer.entry = Some(entry.clone());
            attr.insert("analyzer_entry".to_string(), ConfigSource::Cli);
        }
        if let Some(verbose) = cli.verbose {
            self.logging.verbose = Some(verbose);
            attr.insert("verbose".to_string(), ConfigSource::Cli);
        }
        if let Some(json) = cli.log_json {
            self.logging.json = Some(json);
            attr.insert("log_json".to_string(), ConfigSource::Cli);
        }
    }

    /// Locate the config file for a run.
    ///
    /// `WAVEFORGE_HOME/config.toml` wins when the variable is set; otherwise walks up
    /// from `start_dir` looking for `.waveforge/config.toml`, stopping at repository
    /// root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        if let Ok(home) = env::var(ENV_HOME)
            && !home.trim().is_empty()
        {
            let candidate = PathBuf::from(home).join("config.toml");
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        let mut current_dir = start_dir.to_path_buf();
        loop {
            let config_path = current_dir.join(".waveforge").join("config.toml");
            if config_path.exists() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: TomlConfig = toml::from_str(&content).map_err(|e| {
                    waveforge_utils::ConfigError::InvalidFile(format!("{}: {e}", path.display()))
                })?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TomlConfig::default()),
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }
}
