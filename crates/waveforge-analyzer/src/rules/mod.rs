//! Individual analyzer rules. Each rule reads the shared [`RuleContext`] and returns
//! its issues in a deterministic order.

pub mod fidelity;
pub mod imports;
pub mod module_system;
pub mod placeholder;
pub mod routing;
pub mod store_selector;

use crate::AnalyzerOptions;
use crate::graph::{ModuleGraph, ModuleNode};
use crate::project::Project;
use crate::resolve::Resolver;
use crate::tree::ArtifactTree;

pub struct RuleContext<'a> {
    pub tree: &'a ArtifactTree,
    pub project: &'a Project,
    pub resolver: &'a Resolver<'a>,
    pub graph: &'a ModuleGraph,
    pub options: &'a AnalyzerOptions,
}

impl RuleContext<'_> {
    /// Reachable modules that belong to the canonical root.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleNode> {
        self.graph
            .reachable()
            .filter(|module| self.project.in_scope(&module.path))
    }

    /// Raw (comment-preserving) content of a module.
    pub fn raw(&self, path: &str) -> &str {
        self.tree.get(path).unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{AnalyzerOptions, ArtifactAnalyzer, ArtifactIssue, IssueCategory};
    use waveforge_utils::types::ArtifactFile;

    pub const PACKAGE_JSON: &str =
        r#"{"type":"module","dependencies":{"react":"^18.3.0","react-dom":"^18.3.0","react-router-dom":"^6.26.0","zustand":"^4.5.0"}}"#;

    pub fn analyze(files: &[(&str, &str)]) -> Vec<ArtifactIssue> {
        analyze_with(files, AnalyzerOptions::default())
    }

    pub fn analyze_with(files: &[(&str, &str)], options: AnalyzerOptions) -> Vec<ArtifactIssue> {
        let files: Vec<ArtifactFile> = files
            .iter()
            .map(|(p, c)| ArtifactFile::new(*p, *c))
            .collect();
        ArtifactAnalyzer::new(options).analyze(&files).issues
    }

    pub fn of(issues: &[ArtifactIssue], category: IssueCategory) -> Vec<&ArtifactIssue> {
        issues.iter().filter(|i| i.category == category).collect()
    }
}
