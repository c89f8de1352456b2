use once_cell::sync::Lazy;
use regex::Regex;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::source::{line_of, matching_close, split_top_level};

use super::RuleContext;

static STORE_HOOK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(use\w*Store|useSelector)\s*\(").expect("static regex"));
static FRESH_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\.(?:filter|map|slice|concat|reduce|sort|toSorted|flatMap)\s*\(|\bObject\.(?:keys|values|entries|assign|fromEntries)\s*\(|\.\.\.|\bnew\s+[A-Z]|\bArray\.from\s*\(",
    )
    .expect("static regex")
});
static RETURNS_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\breturn\s*[\[{(]").expect("static regex"));
static SHALLOW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:useShallow|shallow|shallowEqual)\b").expect("static regex"));

/// Whether an inline selector builds a new composite value on every call.
#[must_use]
pub fn selector_returns_fresh_value(selector: &str) -> bool {
    let Some(arrow) = selector.find("=>") else {
        return false;
    };
    let body = selector[arrow + 2..].trim();
    if body.starts_with("({") || body.starts_with('[') {
        return true;
    }
    if body.starts_with('{') {
        return RETURNS_LITERAL.is_match(body) || FRESH_EXPRESSION.is_match(body);
    }
    FRESH_EXPRESSION.is_match(body)
}

/// Store subscriptions whose selector returns a fresh object/array each render.
pub fn check(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let mut issues = Vec::new();
    for module in ctx.modules() {
        let code = &module.code;
        for caps in STORE_HOOK.captures_iter(code) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let open = whole.end() - 1;
            let Some(close) = matching_close(code, open) else {
                continue;
            };
            let args = &code[open + 1..close - 1];
            if SHALLOW.is_match(args) {
                continue;
            }
            let Some(selector) = split_top_level(args).into_iter().next() else {
                continue;
            };
            if selector_returns_fresh_value(selector) {
                issues.push(ArtifactIssue::in_file(
                    IssueCategory::StateSubscription,
                    &module.path,
                    format!(
                        "selector passed to {} at line {} returns a new object or array on every call (render-loop risk)",
                        &caps[1],
                        line_of(code, whole.start())
                    ),
                ));
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{PACKAGE_JSON, analyze, of};

    #[test]
    fn test_fresh_selectors() {
        assert!(selector_returns_fresh_value("(s) => ({ items: s.items, total: s.total })"));
        assert!(selector_returns_fresh_value("s => [s.a, s.b]"));
        assert!(selector_returns_fresh_value("s => s.items.filter(i => i.done)"));
        assert!(selector_returns_fresh_value("state => { return { a: state.a } }"));
        assert!(selector_returns_fresh_value("s => Object.values(s.byId)"));
    }

    #[test]
    fn test_stable_selectors() {
        assert!(!selector_returns_fresh_value("(s) => s.items"));
        assert!(!selector_returns_fresh_value("s => s.items.length"));
        assert!(!selector_returns_fresh_value("selectTotal"));
        assert!(!selector_returns_fresh_value("state => { return state.count }"));
    }

    #[test]
    fn test_shallow_wrapped_selector_is_exempt() {
        let issues = analyze(&[
            ("package.json", PACKAGE_JSON),
            (
                "src/main.tsx",
                "import { useShallow } from 'zustand/react/shallow'\nimport { useCartStore } from './store'\nconst a = useCartStore(useShallow(s => ({ items: s.items })))\nconst b = useCartStore((s) => ({ total: s.total }))\n",
            ),
            ("src/store.ts", "export const useCartStore = create(() => ({ items: [] }))"),
        ]);
        let found = of(&issues, IssueCategory::StateSubscription);
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("useCartStore at line 4"));
    }
}
