//! Artifact store: read access to the artifact tree a session produced
//!
//! The quality gate lists every file of the session before each analyzer pass. Two
//! stores are provided: an in-memory map (tests, embedding) and a filesystem walker.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

use waveforge_utils::error::ArtifactStoreError;
use waveforge_utils::types::{ArtifactFile, PatchIntent};

/// Directories never read into the artifact tree.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".next", ".cache"];

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Every file of the session's artifact tree with forward-slash relative paths,
    /// sorted by path.
    async fn list_files(&self, session_id: &str) -> Result<Vec<ArtifactFile>, ArtifactStoreError>;
}

/// Sessions held in memory. Unknown sessions are an error.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    sessions: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryArtifactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one session.
    pub fn with_files<I, P, C>(session_id: &str, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let tree = files
            .into_iter()
            .map(|(path, content)| (path.into(), content.into()))
            .collect();
        let mut sessions = HashMap::new();
        sessions.insert(session_id.to_string(), tree);
        Self {
            sessions: RwLock::new(sessions),
        }
    }

    pub async fn write_file(
        &self,
        session_id: &str,
        path: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(path.into(), content.into());
    }

    /// Apply a patch intent as a whole-file write.
    pub async fn apply_patch(&self, session_id: &str, patch: &PatchIntent) {
        self.write_file(session_id, patch.file_path.clone(), patch.content.clone())
            .await;
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn list_files(&self, session_id: &str) -> Result<Vec<ArtifactFile>, ArtifactStoreError> {
        let sessions = self.sessions.read().await;
        let tree = sessions
            .get(session_id)
            .ok_or_else(|| ArtifactStoreError::UnknownSession {
                session_id: session_id.to_string(),
            })?;
        Ok(tree
            .iter()
            .map(|(path, content)| ArtifactFile::new(path.clone(), content.clone()))
            .collect())
    }
}

#[derive(Debug, Clone)]
enum FsLayout {
    /// Every session reads the same directory
    Single(PathBuf),
    /// `<base>/<session_id>`
    PerSession(PathBuf),
}

/// Reads artifact trees from disk.
///
/// Build output and dependency directories ([`SKIPPED_DIRS`]) are pruned, and files that
/// are not valid UTF-8 are skipped.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    layout: FsLayout,
}

impl FsArtifactStore {
    /// Serve `root` for every session id.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: FsLayout::Single(root.into()),
        }
    }

    /// Serve `base/<session_id>`; a missing directory is an unknown session.
    pub fn per_session(base: impl Into<PathBuf>) -> Self {
        Self {
            layout: FsLayout::PerSession(base.into()),
        }
    }

    fn root_for(&self, session_id: &str) -> Result<PathBuf, ArtifactStoreError> {
        match &self.layout {
            FsLayout::Single(root) => Ok(root.clone()),
            FsLayout::PerSession(base) => {
                let dir = base.join(session_id);
                if session_id.is_empty() || session_id.contains(['/', '\\']) || !dir.is_dir() {
                    return Err(ArtifactStoreError::UnknownSession {
                        session_id: session_id.to_string(),
                    });
                }
                Ok(dir)
            }
        }
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Walk `root` and read every UTF-8 file.
pub fn read_tree(root: &Path) -> Result<Vec<ArtifactFile>, ArtifactStoreError> {
    let io_error = |source: std::io::Error| ArtifactStoreError::Io {
        path: root.display().to_string(),
        source,
    };
    if !root.is_dir() {
        return Err(io_error(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not a directory",
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
    {
        let entry = entry.map_err(|e| ArtifactStoreError::Io {
            path: e
                .path()
                .map_or_else(|| root.display().to_string(), |p| p.display().to_string()),
            source: e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = relative_path(root, entry.path()) else {
            trace!(path = %entry.path().display(), "Skipping non-UTF-8 path");
            continue;
        };
        let bytes = std::fs::read(entry.path()).map_err(|source| ArtifactStoreError::Io {
            path: entry.path().display().to_string(),
            source,
        })?;
        match String::from_utf8(bytes) {
            Ok(content) => files.push(ArtifactFile::new(path, content)),
            Err(_) => trace!(path = %path, "Skipping binary file"),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = files.len(), "Read artifact tree");
    Ok(files)
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn list_files(&self, session_id: &str) -> Result<Vec<ArtifactFile>, ArtifactStoreError> {
        let root = self.root_for(session_id)?;
        tokio::task::spawn_blocking(move || read_tree(&root))
            .await
            .map_err(|e| ArtifactStoreError::Unavailable(e.to_string()))?
    }
}
