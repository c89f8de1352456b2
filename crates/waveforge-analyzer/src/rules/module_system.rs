use once_cell::sync::Lazy;
use regex::Regex;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::paths;
use crate::source::{line_of, strip_comments};

use super::RuleContext;

static COMMONJS_PRIMITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b__dirname\b|\b__filename\b|\brequire\s*\(").expect("static regex")
});
static DECLARES_DIRNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var)\s+(?:__dirname|__filename)\b").expect("static regex")
});
static MODULE_EXPORTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bmodule\.exports\b").expect("static regex"));

/// Under `"type": "module"`, build configs that rely on CommonJS-only primitives fail at
/// load time even when alias resolution looks correct.
pub fn check(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let Some(manifest) = &ctx.project.manifest else {
        return Vec::new();
    };
    if !manifest.is_module {
        return Vec::new();
    }

    let mut configs: Vec<&str> = ctx
        .tree
        .paths()
        .filter(|p| paths::parent(p) == ctx.project.root)
        .filter(|p| paths::file_name(p).starts_with("vite.config."))
        .filter(|p| matches!(paths::extension(p), Some("ts" | "js" | "mjs" | "mts")))
        .collect();
    configs.sort_unstable();

    let mut issues = Vec::new();
    for config in configs {
        let code = strip_comments(ctx.raw(config));
        let dirname_alias = ctx
            .project
            .aliases
            .iter()
            .any(|a| a.vite && a.uses_dirname && a.origin == config);

        let declared = DECLARES_DIRNAME.is_match(&code);
        if let Some(m) = COMMONJS_PRIMITIVE
            .find_iter(&code)
            .find(|m| !(declared && m.as_str().starts_with("__")))
        {
            let what = if dirname_alias {
                "alias resolution uses"
            } else {
                "config uses"
            };
            issues.push(ArtifactIssue::in_file(
                IssueCategory::ModuleSystem,
                config,
                format!(
                    "{what} CommonJS-only '{}' at line {} but package.json declares \"type\": \"module\"",
                    m.as_str().trim_end_matches(|c: char| c == '(' || c.is_whitespace()),
                    line_of(&code, m.start())
                ),
            ));
        }

        if paths::extension(config) == Some("js") && MODULE_EXPORTS.is_match(&code) {
            issues.push(ArtifactIssue::in_file(
                IssueCategory::ModuleSystem,
                config,
                "config uses module.exports but package.json declares \"type\": \"module\"",
            ));
        }
    }
    issues
}
