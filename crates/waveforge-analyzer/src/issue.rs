use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString, IntoStaticStr};

/// Rule family that produced an [`ArtifactIssue`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueCategory {
    Entry,
    Placeholder,
    LowFidelity,
    Routing,
    RouteContract,
    GenericRoutes,
    UnresolvedImport,
    ModuleSystem,
    StateSubscription,
}

/// A concrete defect found in the artifact tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactIssue {
    pub category: IssueCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl ArtifactIssue {
    pub fn new(
        category: IssueCategory,
        message: impl Into<String>,
        file_path: Option<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            file_path,
        }
    }

    pub fn in_file(category: IssueCategory, file_path: &str, message: impl Into<String>) -> Self {
        Self::new(category, message, Some(file_path.to_string()))
    }
}

impl fmt::Display for ArtifactIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "[{}] {}: {}", self.category, path, self.message),
            None => write!(f, "[{}] {}", self.category, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_display() {
        let issue = ArtifactIssue::in_file(
            IssueCategory::Placeholder,
            "src/pages/Home.tsx",
            "placeholder marker 'TODO' at line 3",
        );
        assert_eq!(
            issue.to_string(),
            "[placeholder] src/pages/Home.tsx: placeholder marker 'TODO' at line 3"
        );
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&IssueCategory::UnresolvedImport).unwrap();
        assert_eq!(json, "\"unresolved_import\"");
        assert_eq!(IssueCategory::LowFidelity.to_string(), "low_fidelity");
    }
}
