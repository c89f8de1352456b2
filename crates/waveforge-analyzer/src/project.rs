//! Project discovery: package roots, entry module, declared packages and path aliases

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::paths;
use crate::resolve::resolve_file;
use crate::source::{matching_close, parse_jsonc, split_top_level, string_literals};
use crate::tree::ArtifactTree;

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>").expect("static regex"));
static SRC_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).expect("static regex"));
static MODULE_TYPE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\btype\s*=\s*["']module["']"#).expect("static regex"));
static ALIAS_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\balias\s*:\s*").expect("static regex"));

const CONVENTIONAL_ENTRIES: [&str; 2] = ["src/main", "src/index"];
const ENTRY_EXTENSIONS: [&str; 4] = ["tsx", "ts", "jsx", "js"];
const TS_CONFIG_FILES: [&str; 3] = ["tsconfig.json", "tsconfig.app.json", "jsconfig.json"];
const VITE_CONFIG_FILES: [&str; 6] = [
    "vite.config.ts",
    "vite.config.js",
    "vite.config.mjs",
    "vite.config.mts",
    "vite.config.cjs",
    "vite.config.cts",
];

/// Parsed `package.json` of a project root.
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    pub path: String,
    /// `"type": "module"`
    pub is_module: bool,
    /// Names from dependencies, devDependencies, peerDependencies and optionalDependencies
    pub packages: BTreeSet<String>,
}

impl PackageManifest {
    fn parse(path: &str, content: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let mut packages = BTreeSet::new();
        for section in [
            "dependencies",
            "devDependencies",
            "peerDependencies",
            "optionalDependencies",
        ] {
            if let Some(deps) = value.get(section).and_then(|v| v.as_object()) {
                packages.extend(deps.keys().cloned());
            }
        }
        Ok(Self {
            path: path.to_string(),
            is_module: value.get("type").and_then(|v| v.as_str()) == Some("module"),
            packages,
        })
    }

    #[must_use]
    pub fn declares(&self, package: &str) -> bool {
        self.packages.contains(package)
    }
}

/// A path alias from a tsconfig/jsconfig `paths` entry or a vite `resolve.alias` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Text before the `*` (or the whole key for exact aliases)
    pub prefix: String,
    /// Text after the `*`
    pub suffix: String,
    /// tsconfig-style `*` pattern; vite aliases match `key` and `key/...`
    pub wildcard: bool,
    /// Targets, normalized; wildcard targets keep their `*`
    pub targets: Vec<String>,
    pub vite: bool,
    /// Config file the alias came from
    pub origin: String,
    /// Target expression depends on `__dirname`
    pub uses_dirname: bool,
}

impl Alias {
    /// Candidate paths for `specifier`, or `None` when the alias does not apply.
    #[must_use]
    pub fn rewrite(&self, specifier: &str) -> Option<Vec<String>> {
        if self.vite {
            let key = self.prefix.trim_end_matches('/');
            let rest = if specifier == key {
                ""
            } else if let Some(rest) = specifier.strip_prefix(key)
                && rest.starts_with('/')
            {
                rest
            } else {
                return None;
            };
            return Some(
                self.targets
                    .iter()
                    .map(|t| paths::normalize(&format!("{t}{rest}")))
                    .collect(),
            );
        }

        if self.wildcard {
            let middle = specifier
                .strip_prefix(&self.prefix)?
                .strip_suffix(&self.suffix)?;
            Some(
                self.targets
                    .iter()
                    .map(|t| paths::normalize(&t.replacen('*', middle, 1)))
                    .collect(),
            )
        } else if specifier == self.prefix {
            Some(self.targets.clone())
        } else {
            None
        }
    }
}

/// The canonical project the analyzer reports on.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory of the canonical root; empty for the artifact root
    pub root: String,
    pub entry: String,
    pub manifest: Option<PackageManifest>,
    pub aliases: Vec<Alias>,
    /// Other package roots nested inside `root`; their files are out of scope
    pub nested_roots: Vec<String>,
}

impl Project {
    /// Whether issues for `path` belong to this project.
    #[must_use]
    pub fn in_scope(&self, path: &str) -> bool {
        paths::is_within(path, &self.root)
            && !self
                .nested_roots
                .iter()
                .any(|nested| paths::is_within(path, nested))
    }
}

/// Directories holding a `package.json`, shallowest first. Falls back to the artifact
/// root when there is none.
fn package_roots(tree: &ArtifactTree) -> Vec<String> {
    let mut roots: Vec<String> = tree
        .paths()
        .filter(|p| paths::file_name(p) == "package.json")
        .filter(|p| !p.split('/').any(|seg| seg == "node_modules"))
        .map(|p| paths::parent(p).to_string())
        .collect();
    if roots.is_empty() {
        roots.push(String::new());
    }
    roots.sort_by(|a, b| paths::depth(a).cmp(&paths::depth(b)).then_with(|| a.cmp(b)));
    roots
}

/// Find the entry module of a root: `index.html` module script first, then
/// `src/main.*` and `src/index.*`.
fn find_entry(tree: &ArtifactTree, root: &str, issues: &mut Vec<ArtifactIssue>) -> Option<String> {
    let html_path = paths::join(root, "index.html");
    if let Some(html) = tree.get(&html_path) {
        for caps in SCRIPT_TAG.captures_iter(html) {
            let attrs = &caps[1];
            if !MODULE_TYPE_ATTR.is_match(attrs) {
                continue;
            }
            let Some(src) = SRC_ATTR.captures(attrs).map(|c| c[1].to_string()) else {
                continue;
            };
            let candidate = paths::join(root, src.split('?').next().unwrap_or(&src));
            match resolve_file(tree, &candidate) {
                Some(entry) => return Some(entry),
                None => issues.push(ArtifactIssue::new(
                    IssueCategory::Entry,
                    format!("index.html references missing entry module '{src}'"),
                    Some(html_path.clone()),
                )),
            }
        }
    }

    for base in CONVENTIONAL_ENTRIES {
        for ext in ENTRY_EXTENSIONS {
            let candidate = paths::join(root, &format!("{base}.{ext}"));
            if tree.contains(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Locate the canonical project. Returns `None` (with an `entry` issue) when no entry
/// module exists anywhere.
pub fn discover(
    tree: &ArtifactTree,
    entry_override: Option<&str>,
    issues: &mut Vec<ArtifactIssue>,
) -> Option<Project> {
    let roots = package_roots(tree);

    let (root, entry) = if let Some(explicit) = entry_override {
        let normalized = paths::normalize(explicit);
        let Some(entry) = resolve_file(tree, &normalized) else {
            issues.push(ArtifactIssue::new(
                IssueCategory::Entry,
                format!("configured entry module '{explicit}' does not exist"),
                None,
            ));
            return None;
        };
        // The entry belongs to the deepest package root that contains it
        let root = roots
            .iter()
            .rev()
            .find(|r| paths::is_within(&entry, r))
            .cloned()
            .unwrap_or_default();
        (root, entry)
    } else {
        let mut found = None;
        let mut entry_issues = Vec::new();
        for root in &roots {
            let mut root_issues = Vec::new();
            if let Some(entry) = find_entry(tree, root, &mut root_issues) {
                entry_issues.extend(root_issues);
                found = Some((root.clone(), entry));
                break;
            }
            entry_issues.extend(root_issues);
        }
        match found {
            Some(found) => {
                // Only keep entry diagnostics that concern the chosen root
                issues.extend(
                    entry_issues
                        .into_iter()
                        .filter(|i| i.file_path.as_deref().is_some_and(|p| paths::is_within(p, &found.0))),
                );
                found
            }
            None => {
                issues.extend(entry_issues);
                issues.push(ArtifactIssue::new(
                    IssueCategory::Entry,
                    "no entry module found (expected index.html module script, src/main.* or src/index.*)",
                    None,
                ));
                return None;
            }
        }
    };

    debug!(root = %root, entry = %entry, "Resolved canonical project");

    let manifest_path = paths::join(&root, "package.json");
    let manifest = match tree.get(&manifest_path) {
        Some(content) => match PackageManifest::parse(&manifest_path, content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                issues.push(ArtifactIssue::new(
                    IssueCategory::ModuleSystem,
                    format!("package.json is not valid JSON: {e}"),
                    Some(manifest_path.clone()),
                ));
                None
            }
        },
        None => None,
    };

    let nested_roots = roots
        .iter()
        .filter(|r| **r != root && paths::is_within(r, &root))
        .cloned()
        .collect();

    let mut aliases = tsconfig_aliases(tree, &root);
    aliases.extend(vite_aliases(tree, &root));

    Some(Project {
        root,
        entry,
        manifest,
        aliases,
        nested_roots,
    })
}

fn tsconfig_aliases(tree: &ArtifactTree, root: &str) -> Vec<Alias> {
    let mut aliases = Vec::new();
    for name in TS_CONFIG_FILES {
        let config_path = paths::join(root, name);
        let Some(content) = tree.get(&config_path) else {
            continue;
        };
        let value = match parse_jsonc(content) {
            Ok(value) => value,
            Err(e) => {
                debug!(path = %config_path, error = %e, "Skipping unparsable tsconfig");
                continue;
            }
        };
        let Some(options) = value.get("compilerOptions") else {
            continue;
        };
        let base_url = options
            .get("baseUrl")
            .and_then(|v| v.as_str())
            .unwrap_or(".");
        let base = paths::join(root, base_url);
        let Some(entries) = options.get("paths").and_then(|v| v.as_object()) else {
            continue;
        };
        for (key, targets) in entries {
            let targets: Vec<String> = targets
                .as_array()
                .map(|arr| {
                    arr.iter()
                        .filter_map(|t| t.as_str())
                        .map(|t| paths::join(&base, t))
                        .collect()
                })
                .unwrap_or_default();
            if targets.is_empty() {
                continue;
            }
            let (prefix, suffix, wildcard) = match key.split_once('*') {
                Some((prefix, suffix)) => (prefix.to_string(), suffix.to_string(), true),
                None => (key.clone(), String::new(), false),
            };
            aliases.push(Alias {
                prefix,
                suffix,
                wildcard,
                targets,
                vite: false,
                origin: config_path.clone(),
                uses_dirname: false,
            });
        }
    }
    aliases
}

/// Evaluate the target expression of a vite alias relative to the config directory.
fn evaluate_alias_target(expr: &str, config_dir: &str, root: &str) -> Option<String> {
    let literals = string_literals(expr);
    let first = literals.first()?;
    if expr.contains("new URL(") {
        return Some(paths::join(config_dir, first));
    }
    if expr.contains("resolve(") || expr.contains("join(") {
        let joined = literals
            .iter()
            .map(|s| s.trim_start_matches('/'))
            .collect::<Vec<_>>()
            .join("/");
        return Some(paths::join(config_dir, &joined));
    }
    if first.starts_with('/') {
        Some(paths::join(root, first))
    } else {
        Some(paths::join(config_dir, first))
    }
}

fn unquote(key: &str) -> &str {
    key.trim()
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
}

fn vite_aliases(tree: &ArtifactTree, root: &str) -> Vec<Alias> {
    let mut aliases = Vec::new();
    for name in VITE_CONFIG_FILES {
        let config_path = paths::join(root, name);
        let Some(raw) = tree.get(&config_path) else {
            continue;
        };
        let content = crate::source::strip_comments(raw);
        let config_dir = paths::parent(&config_path).to_string();

        for m in ALIAS_KEY.find_iter(&content) {
            let open = m.end();
            let Some(opener) = content[open..].chars().next() else {
                continue;
            };
            if opener != '{' && opener != '[' {
                continue;
            }
            let Some(close) = matching_close(&content, open) else {
                continue;
            };
            let inner = &content[open + 1..close - 1];

            let mut push = |key: &str, expr: &str| {
                if let Some(target) = evaluate_alias_target(expr, &config_dir, root) {
                    aliases.push(Alias {
                        prefix: key.to_string(),
                        suffix: String::new(),
                        wildcard: false,
                        targets: vec![target],
                        vite: true,
                        origin: config_path.clone(),
                        uses_dirname: expr.contains("__dirname"),
                    });
                }
            };

            if opener == '{' {
                for entry in split_top_level(inner) {
                    if let Some((key, expr)) = split_property(entry) {
                        push(unquote(key), expr);
                    }
                }
            } else {
                for item in split_top_level(inner) {
                    let item = item.trim().trim_start_matches('{').trim_end_matches('}');
                    let mut find = None;
                    let mut replacement = None;
                    for prop in split_top_level(item) {
                        if let Some((key, expr)) = split_property(prop) {
                            match unquote(key) {
                                "find" => find = string_literals(expr).into_iter().next(),
                                "replacement" => replacement = Some(expr),
                                _ => {}
                            }
                        }
                    }
                    if let (Some(find), Some(expr)) = (find, replacement) {
                        push(&find, expr);
                    }
                }
            }
        }
    }
    aliases
}

/// Split `key: value` at the first colon outside quotes.
fn split_property(entry: &str) -> Option<(&str, &str)> {
    let entry = entry.trim();
    let mut quote: Option<char> = None;
    for (idx, c) in entry.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' || c == '`' => quote = Some(c),
            None if c == ':' => return Some((&entry[..idx], entry[idx + 1..].trim())),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use waveforge_utils::types::ArtifactFile;

    fn tree(files: &[(&str, &str)]) -> ArtifactTree {
        let files: Vec<ArtifactFile> = files
            .iter()
            .map(|(p, c)| ArtifactFile::new(*p, *c))
            .collect();
        ArtifactTree::from_files(&files)
    }

    #[test]
    fn test_entry_from_index_html() {
        let tree = tree(&[
            ("package.json", "{}"),
            (
                "index.html",
                r#"<div id="root"></div><script type="module" src="/src/app.tsx"></script>"#,
            ),
            ("src/app.tsx", ""),
            ("src/main.tsx", ""),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        assert_eq!(project.entry, "src/app.tsx");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_missing_html_entry_falls_back_to_convention() {
        let tree = tree(&[
            ("package.json", "{}"),
            (
                "index.html",
                r#"<script type="module" src="/src/missing.tsx"></script>"#,
            ),
            ("src/main.tsx", ""),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        assert_eq!(project.entry, "src/main.tsx");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Entry);
    }

    #[test]
    fn test_shallowest_root_with_entry_wins() {
        let tree = tree(&[
            ("package.json", "{}"),
            ("README.md", ""),
            ("app/package.json", "{}"),
            ("app/src/main.tsx", ""),
            ("app/copy/package.json", "{}"),
            ("app/copy/src/main.tsx", ""),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        assert_eq!(project.root, "app");
        assert_eq!(project.nested_roots, vec!["app/copy".to_string()]);
        assert!(project.in_scope("app/src/main.tsx"));
        assert!(!project.in_scope("app/copy/src/main.tsx"));
    }

    #[test]
    fn test_no_entry_reports_issue() {
        let tree = tree(&[("package.json", "{}"), ("src/util.ts", "")]);
        let mut issues = Vec::new();
        assert!(discover(&tree, None, &mut issues).is_none());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::Entry);
    }

    #[test]
    fn test_entry_override_picks_owning_root() {
        let tree = tree(&[
            ("package.json", "{}"),
            ("src/main.tsx", ""),
            ("web/package.json", "{}"),
            ("web/src/boot.tsx", ""),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, Some("web/src/boot.tsx"), &mut issues).unwrap();
        assert_eq!(project.root, "web");
        assert_eq!(project.entry, "web/src/boot.tsx");
    }

    #[test]
    fn test_tsconfig_paths_alias() {
        let tree = tree(&[
            ("package.json", "{}"),
            ("src/main.tsx", ""),
            (
                "tsconfig.json",
                r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@/*": ["src/*"] } } }"#,
            ),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        assert_eq!(project.aliases.len(), 1);
        assert_eq!(
            project.aliases[0].rewrite("@/components/Button"),
            Some(vec!["src/components/Button".to_string()])
        );
        assert_eq!(project.aliases[0].rewrite("react"), None);
    }

    #[test]
    fn test_vite_object_and_array_aliases() {
        let tree = tree(&[
            ("package.json", "{}"),
            ("src/main.tsx", ""),
            (
                "vite.config.ts",
                r#"
import { fileURLToPath, URL } from 'node:url'
import path from 'path'
export default defineConfig({
  resolve: {
    alias: {
      '@': fileURLToPath(new URL('./src', import.meta.url)),
      '~lib': path.resolve(__dirname, 'src', 'lib'),
    },
  },
})
"#,
            ),
            (
                "vite.config.mjs",
                r#"export default { resolve: { alias: [{ find: '#', replacement: '/shared' }] } }"#,
            ),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        let vite: Vec<&Alias> = project.aliases.iter().filter(|a| a.vite).collect();
        assert_eq!(vite.len(), 3);
        assert_eq!(vite[0].rewrite("@/App"), Some(vec!["src/App".to_string()]));
        assert_eq!(vite[0].rewrite("@tanstack/query"), None);
        assert!(vite[1].uses_dirname);
        assert_eq!(vite[1].rewrite("~lib/util"), Some(vec!["src/lib/util".to_string()]));
        assert_eq!(vite[2].rewrite("#/x"), Some(vec!["shared/x".to_string()]));
    }

    #[test]
    fn test_manifest_packages() {
        let tree = tree(&[
            (
                "package.json",
                r#"{"type":"module","dependencies":{"react":"^18"},"devDependencies":{"vite":"^5"}}"#,
            ),
            ("src/main.tsx", ""),
        ]);
        let mut issues = Vec::new();
        let project = discover(&tree, None, &mut issues).unwrap();
        let manifest = project.manifest.unwrap();
        assert!(manifest.is_module);
        assert!(manifest.declares("react"));
        assert!(manifest.declares("vite"));
        assert!(!manifest.declares("lodash"));
    }
}
