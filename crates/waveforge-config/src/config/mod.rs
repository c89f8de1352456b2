//! Configuration management for waveforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI/programmatic > environment > config file > defaults. Config files are TOML with
//! `[budget]`, `[repair]`, `[quality]`, `[execution]`, `[analyzer]` and `[logging]`
//! sections.

mod builder;
mod cli_args;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use cli_args::CliArgs;
pub use discovery::{ENV_HOME, ENV_MAX_DURATION_MS, ENV_MAX_REPAIR_ROUNDS, ENV_MAX_TOOL_CALLS};
pub use model::*;

use std::time::Duration;
use waveforge_utils::RuntimeBudget;

impl Config {
    /// Built-in defaults with no file, environment or CLI input.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            budget: BudgetConfig::default(),
            repair: RepairConfig::default(),
            quality: QualityConfig::default(),
            execution: ExecutionConfig::default(),
            analyzer: AnalyzerConfig::default(),
            logging: LoggingConfig::default(),
            source_attribution: discovery::default_attribution(),
        }
    }

    /// Budget ceilings for a run.
    #[must_use]
    pub fn runtime_budget(&self) -> RuntimeBudget {
        RuntimeBudget {
            max_iterations: self.budget.max_iterations,
            max_tool_calls: self.budget.max_tool_calls,
            max_duration_ms: self.budget.max_duration_ms,
            target_score: self.budget.target_score,
        }
    }

    #[must_use]
    pub fn max_repair_rounds(&self) -> u32 {
        self.repair.max_rounds.unwrap_or(DEFAULT_MAX_REPAIR_ROUNDS)
    }

    #[must_use]
    pub fn repair_attempts_per_round(&self) -> u32 {
        self.repair
            .attempts_per_round
            .unwrap_or(DEFAULT_REPAIR_ATTEMPTS_PER_ROUND)
    }

    #[must_use]
    pub fn gate_name(&self) -> &str {
        self.quality.gate_name.as_deref().unwrap_or(DEFAULT_GATE_NAME)
    }

    #[must_use]
    pub fn pass_token(&self) -> &str {
        self.quality.pass_token.as_deref().unwrap_or(DEFAULT_PASS_TOKEN)
    }

    #[must_use]
    pub fn fail_token(&self) -> &str {
        self.quality.fail_token.as_deref().unwrap_or(DEFAULT_FAIL_TOKEN)
    }

    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.execution
            .max_concurrency
            .unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    #[must_use]
    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(
            self.execution
                .cancel_grace_ms
                .unwrap_or(DEFAULT_CANCEL_GRACE_MS),
        )
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.logging.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn log_json(&self) -> bool {
        self.logging.json.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use tempfile::TempDir;

    // Tests that touch WAVEFORGE_* variables are serialized through this lock.
    static CONFIG_ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn config_env_guard() -> MutexGuard<'static, ()> {
        CONFIG_ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_env() {
        for key in [
            ENV_HOME,
            ENV_MAX_TOOL_CALLS,
            ENV_MAX_REPAIR_ROUNDS,
            ENV_MAX_DURATION_MS,
        ] {
            unsafe { std::env::remove_var(key) };
        }
    }

    fn create_test_config_file(dir: &Path, content: &str) -> PathBuf {
        let waveforge_dir = dir.join(".waveforge");
        fs::create_dir_all(&waveforge_dir).unwrap();
        let config_path = waveforge_dir.join("config.toml");
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn isolated_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        // Stop upward discovery at the temp dir
        fs::create_dir_all(temp.path().join(".git")).unwrap();
        temp
    }

    #[test]
    fn test_default_config() {
        let config = Config::defaults();
        assert_eq!(config.max_repair_rounds(), 2);
        assert_eq!(config.repair_attempts_per_round(), 1);
        assert_eq!(config.gate_name(), "artifact-quality");
        assert_eq!(config.pass_token(), "QUALITY_PASSED");
        assert_eq!(config.fail_token(), "QUALITY_FAILED");
        assert_eq!(config.max_concurrency(), 8);
        assert_eq!(config.cancel_grace(), Duration::from_millis(5_000));
        assert_eq!(config.runtime_budget(), RuntimeBudget::unlimited());
    }

    #[test]
    fn test_config_discovery_with_cli_override() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(
            temp_dir.path(),
            r#"
[budget]
max_tool_calls = 30
max_duration_ms = 120000

[repair]
max_rounds = 3

[execution]
max_concurrency = 4
"#,
        );

        let cli_args = CliArgs {
            max_tool_calls: Some(5),
            ..Default::default()
        };
        let config = Config::discover_from(temp_dir.path(), &cli_args).unwrap();

        assert_eq!(config.budget.max_tool_calls, Some(5));
        assert_eq!(config.budget.max_duration_ms, Some(120_000));
        assert_eq!(config.max_repair_rounds(), 3);
        assert_eq!(config.max_concurrency(), 4);
        assert_eq!(
            config.source_attribution.get("max_tool_calls"),
            Some(&ConfigSource::Cli)
        );
        assert_eq!(
            config.source_attribution.get("max_repair_rounds"),
            Some(&ConfigSource::Config)
        );
        assert_eq!(
            config.source_attribution.get("gate_name"),
            Some(&ConfigSource::Default)
        );
    }

    #[test]
    fn test_discovery_searches_upward() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(temp_dir.path(), "[repair]\nattempts_per_round = 2\n");
        let nested = temp_dir.path().join("apps").join("web");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::discover_from(&nested, &CliArgs::default()).unwrap();
        assert_eq!(config.repair_attempts_per_round(), 2);
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(
            temp_dir.path(),
            "[budget]\nmax_tool_calls = 30\n\n[repair]\nmax_rounds = 3\n",
        );

        unsafe {
            std::env::set_var(ENV_MAX_TOOL_CALLS, "12");
            std::env::set_var(ENV_MAX_REPAIR_ROUNDS, "1");
        }
        let cli_args = CliArgs {
            max_repair_rounds: Some(4),
            ..Default::default()
        };
        let config = Config::discover_from(temp_dir.path(), &cli_args).unwrap();
        clear_env();

        assert_eq!(config.budget.max_tool_calls, Some(12));
        assert_eq!(
            config.source_attribution.get("max_tool_calls"),
            Some(&ConfigSource::Env)
        );
        assert_eq!(config.max_repair_rounds(), 4);
    }

    #[test]
    fn test_invalid_env_value_falls_back_to_file() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(temp_dir.path(), "[budget]\nmax_duration_ms = 9000\n");

        unsafe { std::env::set_var(ENV_MAX_DURATION_MS, "soon") };
        let config = Config::discover_from(temp_dir.path(), &CliArgs::default()).unwrap();
        clear_env();

        assert_eq!(config.budget.max_duration_ms, Some(9_000));
        assert_eq!(
            config.source_attribution.get("max_duration_ms"),
            Some(&ConfigSource::Config)
        );
    }

    #[test]
    fn test_waveforge_home_takes_precedence() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(temp_dir.path(), "[repair]\nmax_rounds = 3\n");
        let home = TempDir::new().unwrap();
        fs::write(home.path().join("config.toml"), "[repair]\nmax_rounds = 7\n").unwrap();

        unsafe { std::env::set_var(ENV_HOME, home.path()) };
        let config = Config::discover_from(temp_dir.path(), &CliArgs::default()).unwrap();
        clear_env();

        assert_eq!(config.max_repair_rounds(), 7);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(temp_dir.path(), "[execution]\nmax_concurrency = 0\n");

        let err = Config::discover_from(temp_dir.path(), &CliArgs::default()).unwrap_err();
        assert!(format!("{err:#}").contains("max_concurrency"));

        let err = Config::builder().max_concurrency(0).build().unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn test_unknown_section_is_invalid_file() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        create_test_config_file(temp_dir.path(), "[runner]\nmode = \"native\"\n");

        let err = Config::discover_from(temp_dir.path(), &CliArgs::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid configuration file"));
    }

    #[test]
    fn test_missing_explicit_config_path() {
        let _guard = config_env_guard();
        clear_env();
        let temp_dir = isolated_dir();
        let cli_args = CliArgs {
            config_path: Some(temp_dir.path().join("nope.toml")),
            ..Default::default()
        };
        let err = Config::discover_from(temp_dir.path(), &cli_args).unwrap_err();
        assert!(format!("{err:#}").contains("not found"));
    }

    #[test]
    fn test_builder_attributes_programmatic_source() {
        let config = Config::builder()
            .max_tool_calls(1)
            .max_duration(Duration::from_secs(2))
            .verdict_tokens("LGTM", "NOPE")
            .extra_generic_routes(["pricing"])
            .build()
            .unwrap();

        assert_eq!(config.budget.max_tool_calls, Some(1));
        assert_eq!(config.budget.max_duration_ms, Some(2_000));
        assert_eq!(config.pass_token(), "LGTM");
        assert_eq!(
            config.source_attribution.get("max_tool_calls"),
            Some(&ConfigSource::Programmatic)
        );
        assert_eq!(config.analyzer.extra_generic_routes, vec!["pricing".to_string()]);
    }

    #[test]
    fn test_builder_rejects_overlapping_tokens() {
        let err = Config::builder()
            .verdict_tokens("PASS", "PASS")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pass_token"));

        let err = Config::builder()
            .verdict_tokens("QUALITY", "QUALITY_FAILED")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("distinct"));
    }

    #[test]
    fn test_effective_config_reports_sources() {
        let config = Config::builder().max_iterations(6).build().unwrap();
        let effective = config.effective_config();

        assert_eq!(
            effective.get("max_iterations"),
            Some(&("6".to_string(), "programmatic".to_string()))
        );
        assert_eq!(
            effective.get("max_tool_calls"),
            Some(&("unlimited".to_string(), "default".to_string()))
        );
        assert_eq!(
            effective.get("max_concurrency"),
            Some(&("8".to_string(), "default".to_string()))
        );
    }
}
