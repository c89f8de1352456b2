//! Artifact Quality Analyzer
//!
//! A deterministic, rule-based scan of a generated web-app artifact tree. The analyzer is
//! the authority on the quality gate: any issue it returns fails the gate regardless of
//! what a delegate claims about its own work.
//!
//! Every rule only looks at files reachable from the canonical entry module, inside the
//! package root that entry belongs to.

pub mod graph;
pub mod imports;
pub mod issue;
pub mod paths;
pub mod project;
pub mod resolve;
pub mod rules;
pub mod source;
pub mod tree;

// Re-exports for convenience
pub use issue::{ArtifactIssue, IssueCategory};
pub use project::Project;
pub use rules::routing::RouteContract;
pub use tree::ArtifactTree;

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;
use waveforge_utils::types::ArtifactFile;

use graph::ModuleGraph;
use resolve::Resolver;
use rules::RuleContext;

/// Inputs that are not part of the artifact tree itself.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerOptions {
    /// Explicit entry module, overriding discovery
    pub entry: Option<String>,
    /// Upstream route contract; absent means no coverage check
    pub route_contract: Option<RouteContract>,
    /// Additional labels treated as generic navigation routes
    pub extra_generic_routes: Vec<String>,
}

/// Result of one analysis pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    pub reachable_files: Vec<String>,
    pub issues: Vec<ArtifactIssue>,
}

impl AnalysisReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactAnalyzer {
    options: AnalyzerOptions,
}

impl ArtifactAnalyzer {
    #[must_use]
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    pub fn analyze(&self, files: &[ArtifactFile]) -> AnalysisReport {
        self.analyze_tree(&ArtifactTree::from_files(files))
    }

    pub fn analyze_tree(&self, tree: &ArtifactTree) -> AnalysisReport {
        let mut issues = Vec::new();
        let Some(project) = project::discover(tree, self.options.entry.as_deref(), &mut issues)
        else {
            return AnalysisReport {
                issues: dedup(issues),
                ..AnalysisReport::default()
            };
        };

        let resolver = Resolver::new(tree, &project);
        let graph = ModuleGraph::build(&resolver, &project.entry);
        let ctx = RuleContext {
            tree,
            project: &project,
            resolver: &resolver,
            graph: &graph,
            options: &self.options,
        };

        issues.extend(rules::imports::check(&ctx));
        issues.extend(rules::placeholder::check(&ctx));
        issues.extend(rules::fidelity::check(&ctx));
        issues.extend(rules::routing::check_integrity(&ctx));
        issues.extend(rules::routing::check_contract(&ctx));
        issues.extend(rules::routing::check_generic(&ctx));
        issues.extend(rules::module_system::check(&ctx));
        issues.extend(rules::store_selector::check(&ctx));

        let reachable_files: Vec<String> = ctx.modules().map(|m| m.path.clone()).collect();
        debug!(
            root = %project.root,
            entry = %project.entry,
            reachable = reachable_files.len(),
            issues = issues.len(),
            "Artifact analysis complete"
        );

        AnalysisReport {
            root: Some(project.root.clone()),
            entry: Some(project.entry.clone()),
            reachable_files,
            issues: dedup(issues),
        }
    }
}

/// Run every rule with `options` and return only the issues.
pub fn analyze(files: &[ArtifactFile], options: &AnalyzerOptions) -> Vec<ArtifactIssue> {
    ArtifactAnalyzer::new(options.clone()).analyze(files).issues
}

fn dedup(issues: Vec<ArtifactIssue>) -> Vec<ArtifactIssue> {
    let mut seen = HashSet::new();
    issues
        .into_iter()
        .filter(|issue| seen.insert(issue.clone()))
        .collect()
}
