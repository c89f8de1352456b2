use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.unwrap_or(&ConfigSource::Default).to_string()
}

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    ///
    /// Unset optional ceilings are reported as `unlimited`.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();
        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        let or_unlimited = |value: Option<String>| value.unwrap_or_else(|| "unlimited".to_string());

        add(
            "max_tool_calls",
            or_unlimited(self.budget.max_tool_calls.map(|v| v.to_string())),
        );
        add(
            "max_iterations",
            or_unlimited(self.budget.max_iterations.map(|v| v.to_string())),
        );
        add(
            "max_duration_ms",
            or_unlimited(self.budget.max_duration_ms.map(|v| v.to_string())),
        );
        if let Some(score) = self.budget.target_score {
            add("target_score", score.to_string());
        }
        add("max_repair_rounds", self.max_repair_rounds().to_string());
        add(
            "repair_attempts_per_round",
            self.repair_attempts_per_round().to_string(),
        );
        add("gate_name", self.gate_name().to_string());
        add("pass_token", self.pass_token().to_string());
        add("fail_token", self.fail_token().to_string());
        add("max_concurrency", self.max_concurrency().to_string());
        add(
            "cancel_grace_ms",
            self.cancel_grace().as_millis().to_string(),
        );
        if let Some(entry) = &self.analyzer.entry {
            add("analyzer_entry", entry.clone());
        }
        if !self.analyzer.extra_generic_routes.is_empty() {
            add(
                "extra_generic_routes",
                self.analyzer.extra_generic_routes.join(", "),
            );
        }
        add("verbose", self.verbose().to_string());

        config
    }
}
