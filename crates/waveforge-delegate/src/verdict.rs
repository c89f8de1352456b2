//! Verdict-token parsing for quality check responses

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a quality delegate claimed about the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateVerdict {
    /// Only the pass token was present
    Affirmative,
    /// The fail token was present
    Negative,
    /// Neither token was present
    Missing,
    /// The delegate call itself failed
    Unavailable,
}

impl DelegateVerdict {
    #[must_use]
    pub fn is_affirmative(self) -> bool {
        matches!(self, Self::Affirmative)
    }
}

impl fmt::Display for DelegateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Affirmative => write!(f, "affirmative"),
            Self::Negative => write!(f, "negative"),
            Self::Missing => write!(f, "missing"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Scans free-text responses for the configured pass/fail tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictParser {
    pass_token: String,
    fail_token: String,
}

impl Default for VerdictParser {
    fn default() -> Self {
        Self::new("QUALITY_PASSED", "QUALITY_FAILED")
    }
}

impl VerdictParser {
    #[must_use]
    pub fn new(pass_token: impl Into<String>, fail_token: impl Into<String>) -> Self {
        Self {
            pass_token: pass_token.into(),
            fail_token: fail_token.into(),
        }
    }

    #[must_use]
    pub fn pass_token(&self) -> &str {
        &self.pass_token
    }

    #[must_use]
    pub fn fail_token(&self) -> &str {
        &self.fail_token
    }

    /// Parse a response. The fail token wins when both tokens appear.
    #[must_use]
    pub fn parse(&self, response: &str) -> DelegateVerdict {
        if response.contains(&self.fail_token) {
            DelegateVerdict::Negative
        } else if response.contains(&self.pass_token) {
            DelegateVerdict::Affirmative
        } else {
            DelegateVerdict::Missing
        }
    }

    /// Parse an optional response; no text at all counts as a missing verdict.
    #[must_use]
    pub fn parse_opt(&self, response: Option<&str>) -> DelegateVerdict {
        response.map_or(DelegateVerdict::Missing, |text| self.parse(text))
    }
}
