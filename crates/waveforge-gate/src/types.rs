//! Quality gate types
//!
//! A quality check is never reduced to a single boolean: [`QualityCheckOutcome`] keeps
//! the delegate's self-reported verdict next to the analyzer's findings so both stay
//! inspectable.

use serde::{Deserialize, Serialize};
use strum::Display;
use waveforge_analyzer::ArtifactIssue;
use waveforge_delegate::DelegateVerdict;

/// Terminal status of the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GateStatus {
    Passed,
    Failed,
}

/// Terminal result of the quality/repair loop, written once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGateState {
    /// Gate name
    pub gate: String,
    pub status: GateStatus,
    /// Human-readable summary
    pub summary: String,
}

impl QualityGateState {
    pub fn passed(gate: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            status: GateStatus::Passed,
            summary: summary.into(),
        }
    }

    pub fn failed(gate: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            gate: gate.into(),
            status: GateStatus::Failed,
            summary: summary.into(),
        }
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.status == GateStatus::Passed
    }
}

/// Result of one quality phase: the untrusted delegate verdict plus the analyzer issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheckOutcome {
    pub delegate_verdict: DelegateVerdict,
    pub analyzer_issues: Vec<ArtifactIssue>,
}

impl QualityCheckOutcome {
    #[must_use]
    pub fn new(delegate_verdict: DelegateVerdict, analyzer_issues: Vec<ArtifactIssue>) -> Self {
        Self {
            delegate_verdict,
            analyzer_issues,
        }
    }

    /// Passing requires an affirmative verdict and a clean analyzer result. Analyzer
    /// issues override an affirmative verdict.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.delegate_verdict.is_affirmative() && self.analyzer_issues.is_empty()
    }

    /// The analyzer disagreed with an affirmative delegate claim.
    #[must_use]
    pub fn analyzer_overrode_delegate(&self) -> bool {
        self.delegate_verdict.is_affirmative() && !self.analyzer_issues.is_empty()
    }

    /// Reasons this check failed, verdict first, one line per analyzer issue.
    #[must_use]
    pub fn failure_reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        match self.delegate_verdict {
            DelegateVerdict::Affirmative => {}
            DelegateVerdict::Negative => {
                reasons.push("quality delegate reported failure".to_string());
            }
            DelegateVerdict::Missing => {
                reasons.push("quality delegate response contained no verdict".to_string());
            }
            DelegateVerdict::Unavailable => {
                reasons.push("quality delegate call failed".to_string());
            }
        }
        reasons.extend(self.analyzer_issues.iter().map(ToString::to_string));
        reasons
    }
}
