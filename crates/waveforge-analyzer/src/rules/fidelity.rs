use once_cell::sync::Lazy;
use regex::Regex;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::paths;

use super::RuleContext;

const PAGE_DIRS: [&str; 3] = ["pages", "views", "routes"];
const MAX_STATIC_ELEMENTS: usize = 5;

static INTERACTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bon[A-Z]\w*\s*=|<(?:button|input|form|select|textarea|a|Link|NavLink)\b|\buse(?:State|Reducer|Navigate|Query|Mutation|Form)\b|\buse\w*Store\b",
    )
    .expect("static regex")
});
static LIST_RENDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.map\s*\(").expect("static regex"));
static COMPONENT_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Z][\w.]*[\s/>]").expect("static regex"));
static INTRINSIC_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[a-z][\w-]*[\s/>]").expect("static regex"));
static OUTLET_SHELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<Outlet\b|\{\s*(?:props\.)?children\s*\}|\buseOutlet\s*\(").expect("static regex")
});

/// Page-level module: lives under a pages/views/routes directory or is named `*Page.*`.
#[must_use]
pub fn is_page_file(path: &str) -> bool {
    let name = paths::file_name(path);
    let stem = name.split('.').next().unwrap_or(name);
    if !paths::is_source_file(path) {
        return false;
    }
    stem.ends_with("Page")
        || paths::parent(path)
            .split('/')
            .any(|segment| PAGE_DIRS.contains(&segment))
}

/// Whether a page renders a single static block.
#[must_use]
pub fn is_low_fidelity(code: &str) -> bool {
    let intrinsic = INTRINSIC_ELEMENT.find_iter(code).count();
    let components = COMPONENT_ELEMENT.is_match(code);
    if intrinsic == 0 && !components {
        // Not a rendering module (barrel, route table, helpers)
        return false;
    }
    !OUTLET_SHELL.is_match(code)
        && !INTERACTIVE.is_match(code)
        && !LIST_RENDER.is_match(code)
        && !components
        && intrinsic <= MAX_STATIC_ELEMENTS
}

pub fn check(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    ctx.modules()
        .filter(|module| is_page_file(&module.path) && is_low_fidelity(&module.code))
        .map(|module| {
            ArtifactIssue::in_file(
                IssueCategory::LowFidelity,
                &module.path,
                "page renders a single static block with no interactive elements",
            )
        })
        .collect()
}
