use std::time::Duration;

use waveforge_utils::ConfigError;

use super::discovery::default_attribution;
use super::{
    AnalyzerConfig, BudgetConfig, Config, ConfigSource, ExecutionConfig, LoggingConfig,
    QualityConfig, RepairConfig,
};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding waveforge and the environment or config files must not
    /// influence the result.
    ///
    /// ```rust
    /// use waveforge_config::Config;
    ///
    /// let config = Config::builder()
    ///     .max_tool_calls(20)
    ///     .max_repair_rounds(3)
    ///     .max_concurrency(4)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_repair_rounds(), 3);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Fluent builder for [`Config`].
///
/// Every value set here is attributed to [`ConfigSource::Programmatic`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    max_tool_calls: Option<u32>,
    max_iterations: Option<u32>,
    max_duration: Option<Duration>,
    target_score: Option<f64>,
    max_repair_rounds: Option<u32>,
    repair_attempts_per_round: Option<u32>,
    gate_name: Option<String>,
    pass_token: Option<String>,
    fail_token: Option<String>,
    max_concurrency: Option<usize>,
    cancel_grace: Option<Duration>,
    analyzer_entry: Option<String>,
    extra_generic_routes: Vec<String>,
    verbose: Option<bool>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_tool_calls(mut self, max: u32) -> Self {
        self.max_tool_calls = Some(max);
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Wall-clock ceiling for the whole run.
    #[must_use]
    pub fn max_duration(mut self, max: Duration) -> Self {
        self.max_duration = Some(max);
        self
    }

    #[must_use]
    pub fn target_score(mut self, score: f64) -> Self {
        self.target_score = Some(score);
        self
    }

    #[must_use]
    pub fn max_repair_rounds(mut self, rounds: u32) -> Self {
        self.max_repair_rounds = Some(rounds);
        self
    }

    #[must_use]
    pub fn repair_attempts_per_round(mut self, attempts: u32) -> Self {
        self.repair_attempts_per_round = Some(attempts);
        self
    }

    #[must_use]
    pub fn gate_name(mut self, name: impl Into<String>) -> Self {
        self.gate_name = Some(name.into());
        self
    }

    /// Verdict tokens the quality delegate uses to report pass and fail.
    #[must_use]
    pub fn verdict_tokens(mut self, pass: impl Into<String>, fail: impl Into<String>) -> Self {
        self.pass_token = Some(pass.into());
        self.fail_token = Some(fail.into());
        self
    }

    #[must_use]
    pub fn max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = Some(workers);
        self
    }

    #[must_use]
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = Some(grace);
        self
    }

    #[must_use]
    pub fn analyzer_entry(mut self, entry: impl Into<String>) -> Self {
        self.analyzer_entry = Some(entry.into());
        self
    }

    #[must_use]
    pub fn extra_generic_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_generic_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = Some(verbose);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut attr = default_attribution();
        let mut mark = |key: &str| {
            attr.insert(key.to_string(), ConfigSource::Programmatic);
        };

        let mut budget = BudgetConfig::default();
        if let Some(max) = self.max_tool_calls {
            budget.max_tool_calls = Some(max);
            mark("max_tool_calls");
        }
        if let Some(max) = self.max_iterations {
            budget.max_iterations = Some(max);
            mark("max_iterations");
        }
        if let Some(max) = self.max_duration {
            budget.max_duration_ms = Some(u64::try_from(max.as_millis()).unwrap_or(u64::MAX));
            mark("max_duration_ms");
        }
        if let Some(score) = self.target_score {
            budget.target_score = Some(score);
            mark("target_score");
        }

        let mut repair = RepairConfig::default();
        if let Some(rounds) = self.max_repair_rounds {
            repair.max_rounds = Some(rounds);
            mark("max_repair_rounds");
        }
        if let Some(attempts) = self.repair_attempts_per_round {
            repair.attempts_per_round = Some(attempts);
            mark("repair_attempts_per_round");
        }

        let mut quality = QualityConfig::default();
        if let Some(name) = self.gate_name {
            quality.gate_name = Some(name);
            mark("gate_name");
        }
        if let Some(token) = self.pass_token {
            quality.pass_token = Some(token);
            mark("pass_token");
        }
        if let Some(token) = self.fail_token {
            quality.fail_token = Some(token);
            mark("fail_token");
        }

        let mut execution = ExecutionConfig::default();
        if let Some(workers) = self.max_concurrency {
            execution.max_concurrency = Some(workers);
            mark("max_concurrency");
        }
        if let Some(grace) = self.cancel_grace {
            execution.cancel_grace_ms = Some(u64::try_from(grace.as_millis()).unwrap_or(u64::MAX));
            mark("cancel_grace_ms");
        }

        let mut analyzer = AnalyzerConfig::default();
        if let Some(entry) = self.analyzer_entry {
            analyzer.entry = Some(entry);
            mark("analyzer_entry");
        }
        if !self.extra_generic_routes.is_empty() {
            analyzer.extra_generic_routes = self.extra_generic_routes;
            mark("extra_generic_routes");
        }

        let mut logging = LoggingConfig::default();
        if let Some(verbose) = self.verbose {
            logging.verbose = Some(verbose);
            mark("verbose");
        }

        let config = Config {
            budget,
            repair,
            quality,
            execution,
            analyzer,
            logging,
            source_attribution: attr,
        };
        config.validate()?;
        Ok(config)
    }
}
