//! POSIX-style path arithmetic over artifact-relative paths

use camino::{Utf8Component, Utf8Path};

/// Source extensions the analyzer parses, in resolution order.
pub const SOURCE_EXTENSIONS: [&str; 6] = ["tsx", "ts", "jsx", "js", "mjs", "cjs"];

/// Normalize an artifact path: forward slashes, no leading `/` or `./`, `..` folded.
///
/// `..` segments that would climb above the artifact root are dropped.
#[must_use]
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for component in Utf8Path::new(&unified).components() {
        match component {
            Utf8Component::Normal(part) => parts.push(part),
            Utf8Component::ParentDir => {
                parts.pop();
            }
            Utf8Component::CurDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}

/// Directory part of a normalized path; empty for top-level files.
#[must_use]
pub fn parent(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Join `rel` onto `base_dir` and normalize.
#[must_use]
pub fn join(base_dir: &str, rel: &str) -> String {
    if base_dir.is_empty() {
        normalize(rel)
    } else {
        normalize(&format!("{base_dir}/{rel}"))
    }
}

/// Final path segment.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension without the dot, if any.
#[must_use]
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(&name[idx + 1..])
}

#[must_use]
pub fn is_source_file(path: &str) -> bool {
    extension(path).is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Whether `path` lies inside directory `dir` (the empty dir contains everything).
#[must_use]
pub fn is_within(path: &str, dir: &str) -> bool {
    dir.is_empty() || path == dir || path.starts_with(&format!("{dir}/"))
}

/// Number of directory levels of a directory path.
#[must_use]
pub fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.split('/').count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_dot_segments() {
        assert_eq!(normalize("./src/../src/App.tsx"), "src/App.tsx");
        assert_eq!(normalize("/src//pages/Home.tsx"), "src/pages/Home.tsx");
        assert_eq!(normalize("src\\main.tsx"), "src/main.tsx");
        assert_eq!(normalize("../../outside.ts"), "outside.ts");
    }

    #[test]
    fn test_join_and_parent() {
        assert_eq!(join("src/pages", "../components/Button"), "src/components/Button");
        assert_eq!(join("", "./src/main.tsx"), "src/main.tsx");
        assert_eq!(parent("src/pages/Home.tsx"), "src/pages");
        assert_eq!(parent("index.html"), "");
    }

    #[test]
    fn test_extension_and_source_detection() {
        assert_eq!(extension("src/App.tsx"), Some("tsx"));
        assert_eq!(extension("src/.env"), None);
        assert!(is_source_file("vite.config.mjs"));
        assert!(!is_source_file("src/index.css"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("app/src/main.tsx", "app"));
        assert!(!is_within("application/main.tsx", "app"));
        assert!(is_within("anything.ts", ""));
        assert_eq!(depth(""), 0);
        assert_eq!(depth("a/b"), 2);
    }
}
