use std::collections::BTreeMap;

use waveforge_utils::types::ArtifactFile;

use crate::paths;

/// Read-only snapshot of an artifact tree, keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct ArtifactTree {
    files: BTreeMap<String, String>,
}

impl ArtifactTree {
    #[must_use]
    pub fn from_files(files: &[ArtifactFile]) -> Self {
        let files = files
            .iter()
            .map(|f| (paths::normalize(&f.path), f.content.clone()))
            .filter(|(path, _)| !path.is_empty())
            .collect();
        Self { files }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
