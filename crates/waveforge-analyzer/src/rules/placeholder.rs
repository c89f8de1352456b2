use once_cell::sync::Lazy;
use regex::Regex;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::source::line_of;

use super::RuleContext;

static ENGLISH_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:TODO|FIXME)\b|(?i:\bto be implemented\b|\bnot implemented yet\b|\bcoming soon\b|\blorem ipsum\b)",
    )
    .expect("static regex")
});
static CJK_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new("待实现|待开发|待完善|敬请期待|占位").expect("static regex"));
static PLACEHOLDER_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bplaceholder\b").expect("static regex"));

const PROP_FOLLOWERS: [char; 11] = ['=', ':', '?', '}', ',', ')', '(', '.', '-', ';', '['];
const PROP_LEADERS: [char; 9] = [':', '.', '-', '{', '_', '$', '(', ',', '['];

/// Whether a standalone `placeholder` occurrence is content rather than an attribute,
/// prop, variable, CSS pseudo-element or class name.
fn is_content_placeholder(text: &str, start: usize, end: usize) -> bool {
    let next = text[end..].chars().find(|c| !c.is_whitespace());
    let prev = text[..start].chars().rev().find(|c| !c.is_whitespace());
    if next.is_some_and(|c| PROP_FOLLOWERS.contains(&c)) {
        return false;
    }
    if prev.is_some_and(|c| PROP_LEADERS.contains(&c)) {
        return false;
    }
    // A quoted single word is a class name or key, not rendered copy
    let quoted = |c: Option<char>| matches!(c, Some('"' | '\'' | '`'));
    if quoted(prev) && prev == next {
        return false;
    }
    // Declarations: `const placeholder`, `let placeholder`
    let before = text[..start].trim_end();
    !(before.ends_with("const") || before.ends_with("let") || before.ends_with("var"))
}

/// First placeholder marker in `text` as `(offset, marker)`.
pub fn find_marker(text: &str) -> Option<(usize, String)> {
    let mut hits: Vec<(usize, String)> = Vec::new();
    if let Some(m) = ENGLISH_MARKERS.find(text) {
        hits.push((m.start(), m.as_str().to_string()));
    }
    if let Some(m) = CJK_MARKERS.find(text) {
        hits.push((m.start(), m.as_str().to_string()));
    }
    if let Some(m) = PLACEHOLDER_WORD
        .find_iter(text)
        .find(|m| is_content_placeholder(text, m.start(), m.end()))
    {
        hits.push((m.start(), m.as_str().to_string()));
    }
    hits.into_iter().min_by_key(|(offset, _)| *offset)
}

/// One issue per reachable file containing a placeholder marker.
pub fn check(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    ctx.modules()
        .filter_map(|module| {
            let raw = ctx.raw(&module.path);
            let (offset, marker) = find_marker(raw)?;
            Some(ArtifactIssue::in_file(
                IssueCategory::Placeholder,
                &module.path,
                format!(
                    "placeholder content '{marker}' at line {}",
                    line_of(raw, offset)
                ),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{PACKAGE_JSON, analyze, of};

    #[test]
    fn test_markers_in_both_languages() {
        assert_eq!(find_marker("<p>TODO: wire api</p>").map(|m| m.1), Some("TODO".into()));
        assert_eq!(
            find_marker("<p>Feature coming soon</p>").map(|m| m.1),
            Some("coming soon".into())
        );
        assert_eq!(find_marker("<p>功能待实现</p>").map(|m| m.1), Some("待实现".into()));
        assert_eq!(find_marker("<p>敬请期待</p>").map(|m| m.1), Some("敬请期待".into()));
        assert!(find_marker("const todos = useTodos()").is_none());
    }

    #[test]
    fn test_placeholder_props_are_not_content() {
        for src in [
            r#"<input placeholder="Search products" />"#,
            r#"<Input placeholder={t('search')} />"#,
            "function Field({ label, placeholder }) {}",
            "props.placeholder",
            "const placeholder = 'Email'",
            "input::placeholder { color: gray }",
            r#"<span className="placeholder-glow" />"#,
            r#"<div className="placeholder" />"#,
            "placeholder?: string;",
        ] {
            assert!(find_marker(src).is_none(), "flagged: {src}");
        }
        assert!(find_marker("<div>Placeholder</div>").is_some());
        assert!(find_marker("<p>This is a placeholder page</p>").is_some());
    }

    #[test]
    fn test_only_reachable_files_are_reported() {
        let issues = analyze(&[
            ("package.json", PACKAGE_JSON),
            (
                "src/main.tsx",
                "import { createRoot } from 'react-dom/client'\nimport Home from './Home'\ncreateRoot(el).render(<Home />)",
            ),
            ("src/Home.tsx", "export default function Home() {\n  return <h1>TODO</h1>\n}"),
            ("src/Orphan.tsx", "export default () => <p>Lorem ipsum</p>"),
        ]);
        let found = of(&issues, IssueCategory::Placeholder);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_path.as_deref(), Some("src/Home.tsx"));
        assert!(found[0].message.contains("line 2"));
    }
}
