//! Import specifier resolution against the artifact tree

use crate::paths::{self, SOURCE_EXTENSIONS};
use crate::project::Project;
use crate::tree::ArtifactTree;

const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "crypto",
    "dns",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "querystring",
    "readline",
    "stream",
    "string_decoder",
    "timers",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A file in the artifact tree
    File(String),
    /// A declared npm package
    Package(String),
    Builtin,
    /// Virtual module provided by the build tool
    Virtual,
    Unresolved,
}

/// Resolve a candidate path to a file: exact, with a source extension, as a directory
/// index, then `.js` written for a `.ts` source.
#[must_use]
pub fn resolve_file(tree: &ArtifactTree, candidate: &str) -> Option<String> {
    let candidate = paths::normalize(candidate);
    if tree.contains(&candidate) {
        return Some(candidate);
    }
    for ext in SOURCE_EXTENSIONS.iter().chain(["json"].iter()) {
        let with_ext = format!("{candidate}.{ext}");
        if tree.contains(&with_ext) {
            return Some(with_ext);
        }
    }
    for ext in SOURCE_EXTENSIONS {
        let index = paths::join(&candidate, &format!("index.{ext}"));
        if tree.contains(&index) {
            return Some(index);
        }
    }
    for (written, sources) in [
        (".js", &["ts", "tsx"][..]),
        (".jsx", &["tsx"][..]),
        (".mjs", &["mts"][..]),
    ] {
        if let Some(stem) = candidate.strip_suffix(written) {
            for ext in sources {
                let source = format!("{stem}.{ext}");
                if tree.contains(&source) {
                    return Some(source);
                }
            }
        }
    }
    None
}

/// Package name of a bare specifier (`@scope/pkg/sub` -> `@scope/pkg`).
#[must_use]
pub fn package_name(specifier: &str) -> &str {
    let mut segments = specifier.splitn(3, '/');
    let first = segments.next().unwrap_or(specifier);
    if first.starts_with('@') {
        match segments.next() {
            Some(second) => &specifier[..first.len() + 1 + second.len()],
            None => first,
        }
    } else {
        first
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolves specifiers for one project.
pub struct Resolver<'a> {
    tree: &'a ArtifactTree,
    project: &'a Project,
}

impl<'a> Resolver<'a> {
    #[must_use]
    pub fn new(tree: &'a ArtifactTree, project: &'a Project) -> Self {
        Self { tree, project }
    }

    #[must_use]
    pub fn tree(&self) -> &'a ArtifactTree {
        self.tree
    }

    pub fn resolve(&self, importer: &str, specifier: &str) -> Resolution {
        // Build-tool query suffixes (`?url`, `?raw`) do not change the target file
        let spec = specifier.split('?').next().unwrap_or(specifier);
        if spec.is_empty() {
            return Resolution::Unresolved;
        }

        if is_relative(spec) {
            return self.file(&paths::join(paths::parent(importer), spec));
        }

        if spec.starts_with('/') {
            let root = &self.project.root;
            if let Some(found) = resolve_file(self.tree, &paths::join(root, spec)) {
                return Resolution::File(found);
            }
            return self.file(&paths::join(&paths::join(root, "public"), spec));
        }

        if spec.starts_with("virtual:") || spec.starts_with("\0") {
            return Resolution::Virtual;
        }

        let mut alias_matched = false;
        for alias in &self.project.aliases {
            if let Some(candidates) = alias.rewrite(spec) {
                alias_matched = true;
                if let Some(found) = candidates
                    .iter()
                    .find_map(|c| resolve_file(self.tree, c))
                {
                    return Resolution::File(found);
                }
            }
        }
        if alias_matched {
            return Resolution::Unresolved;
        }

        if let Some(builtin) = spec.strip_prefix("node:") {
            return if NODE_BUILTINS.contains(&package_name(builtin)) {
                Resolution::Builtin
            } else {
                Resolution::Unresolved
            };
        }
        let package = package_name(spec);
        if NODE_BUILTINS.contains(&package) {
            return Resolution::Builtin;
        }
        match &self.project.manifest {
            Some(manifest) if !manifest.declares(package) => Resolution::Unresolved,
            _ => Resolution::Package(package.to_string()),
        }
    }

    fn file(&self, candidate: &str) -> Resolution {
        resolve_file(self.tree, candidate).map_or(Resolution::Unresolved, Resolution::File)
    }
}
