use waveforge_utils::ConfigError;

use super::Config;

const MAX_REPAIR_ROUNDS_LIMIT: u32 = 20;
const MAX_ATTEMPTS_PER_ROUND_LIMIT: u32 = 10;
const MAX_CONCURRENCY_LIMIT: usize = 256;

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(workers) = self.execution.max_concurrency {
            if workers == 0 {
                return Err(invalid("max_concurrency", "must be greater than 0"));
            }
            if workers > MAX_CONCURRENCY_LIMIT {
                return Err(invalid(
                    "max_concurrency",
                    format!("exceeds maximum limit of {MAX_CONCURRENCY_LIMIT}"),
                ));
            }
        }

        if let Some(rounds) = self.repair.max_rounds
            && rounds > MAX_REPAIR_ROUNDS_LIMIT
        {
            return Err(invalid(
                "max_repair_rounds",
                format!("exceeds maximum limit of {MAX_REPAIR_ROUNDS_LIMIT}"),
            ));
        }

        if let Some(attempts) = self.repair.attempts_per_round
            && attempts > MAX_ATTEMPTS_PER_ROUND_LIMIT
        {
            return Err(invalid(
                "repair_attempts_per_round",
                format!("exceeds maximum limit of {MAX_ATTEMPTS_PER_ROUND_LIMIT}"),
            ));
        }

        if let Some(score) = self.budget.target_score
            && !(0.0..=100.0).contains(&score)
        {
            return Err(invalid("target_score", "must be between 0 and 100"));
        }

        let pass = self.pass_token();
        let fail = self.fail_token();
        if pass.trim().is_empty() {
            return Err(invalid("pass_token", "must not be empty"));
        }
        if fail.trim().is_empty() {
            return Err(invalid("fail_token", "must not be empty"));
        }
        if pass == fail || pass.contains(fail) || fail.contains(pass) {
            return Err(invalid(
                "pass_token",
                "pass and fail tokens must be distinct and not contain each other",
            ));
        }

        if self.gate_name().trim().is_empty() {
            return Err(invalid("gate_name", "must not be empty"));
        }

        Ok(())
    }
}
