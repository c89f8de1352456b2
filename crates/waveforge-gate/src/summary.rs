//! Human-readable gate summaries

use waveforge_analyzer::ArtifactIssue;

use crate::types::QualityCheckOutcome;

/// Issues listed inline before the summary is truncated.
pub const MAX_LISTED_ISSUES: usize = 10;

/// Summary for a gate that passed on quality check `checks` after `repairs` repair rounds.
#[must_use]
pub fn passed_summary(checks: u32, repairs: u32) -> String {
    if repairs == 0 {
        format!("quality gate passed on the first check ({checks} check)")
    } else {
        format!("quality gate passed after {repairs} repair round(s) ({checks} checks)")
    }
}

/// Summary for a gate whose repair rounds ran out.
#[must_use]
pub fn exhausted_summary(rounds: u32, last: &QualityCheckOutcome) -> String {
    let reasons = last.failure_reasons();
    let mut summary = format!(
        "degraded completion: repair rounds exhausted after {rounds} round(s); {} unresolved",
        reasons.len()
    );
    summary.push_str(&render_reasons(&reasons));
    summary
}

/// Summary for a loop stopped before reaching a verdict.
#[must_use]
pub fn stopped_summary(reason: &str, unresolved: &[ArtifactIssue]) -> String {
    let reasons: Vec<String> = unresolved.iter().map(ToString::to_string).collect();
    let mut summary = format!("quality gate not reached: {reason}");
    summary.push_str(&render_reasons(&reasons));
    summary
}

fn render_reasons(reasons: &[String]) -> String {
    let mut out = String::new();
    for reason in reasons.iter().take(MAX_LISTED_ISSUES) {
        out.push_str("\n  - ");
        out.push_str(reason);
    }
    if reasons.len() > MAX_LISTED_ISSUES {
        out.push_str(&format!(
            "\n  ... and {} more",
            reasons.len() - MAX_LISTED_ISSUES
        ));
    }
    out
}
