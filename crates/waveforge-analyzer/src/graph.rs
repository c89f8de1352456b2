//! Module graph reachable from the entry file

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::trace;

use crate::imports::{ExportInfo, ImportRef, extract_exports, extract_imports};
use crate::paths;
use crate::resolve::{Resolution, Resolver};
use crate::source::strip_comments;

/// An import together with what it resolved to.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub import: ImportRef,
    pub resolution: Resolution,
}

/// One parsed source module.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub path: String,
    /// Comment-stripped source
    pub code: String,
    pub imports: Vec<ResolvedImport>,
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// Reachable source modules keyed by path
    pub modules: BTreeMap<String, ModuleNode>,
}

impl ModuleGraph {
    /// Breadth-first walk from `entry` over source files.
    pub fn build(resolver: &Resolver<'_>, entry: &str) -> Self {
        let tree = resolver.tree();
        let mut modules = BTreeMap::new();
        let mut queue = VecDeque::from([entry.to_string()]);
        let mut seen = BTreeSet::from([entry.to_string()]);

        while let Some(path) = queue.pop_front() {
            let Some(raw) = tree.get(&path) else {
                continue;
            };
            let code = strip_comments(raw);
            let imports: Vec<ResolvedImport> = extract_imports(&code)
                .into_iter()
                .map(|import| {
                    let resolution = resolver.resolve(&path, &import.specifier);
                    ResolvedImport { import, resolution }
                })
                .collect();

            for resolved in &imports {
                if let Resolution::File(target) = &resolved.resolution
                    && paths::is_source_file(target)
                    && seen.insert(target.clone())
                {
                    trace!(from = %path, to = %target, "Module edge");
                    queue.push_back(target.clone());
                }
            }

            modules.insert(path.clone(), ModuleNode { path, code, imports });
        }

        Self { modules }
    }

    pub fn reachable(&self) -> impl Iterator<Item = &ModuleNode> {
        self.modules.values()
    }

    #[must_use]
    pub fn is_reachable(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ModuleNode> {
        self.modules.get(path)
    }

    /// Exported names of `path`, following `export *` chains. `None` means the export
    /// set cannot be known statically.
    #[must_use]
    pub fn exports_of(&self, resolver: &Resolver<'_>, path: &str) -> Option<BTreeSet<String>> {
        let mut visited = BTreeSet::new();
        self.collect_exports(resolver, path, &mut visited)
    }

    fn collect_exports(
        &self,
        resolver: &Resolver<'_>,
        path: &str,
        visited: &mut BTreeSet<String>,
    ) -> Option<BTreeSet<String>> {
        if !visited.insert(path.to_string()) {
            return Some(BTreeSet::new());
        }
        let info: ExportInfo = match self.modules.get(path) {
            Some(node) => extract_exports(&node.code),
            None => extract_exports(&strip_comments(resolver.tree().get(path)?)),
        };
        if info.opaque {
            return None;
        }
        let mut names = info.names;
        for source in &info.star_sources {
            match resolver.resolve(path, source) {
                Resolution::File(target) if paths::is_source_file(&target) => {
                    names.extend(self.collect_exports(resolver, &target, visited)?);
                }
                _ => return None,
            }
        }
        Some(names)
    }
}
