//! Import and export extraction from comment-stripped module sources

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::source::line_of;

static STATIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(type\s+)?([\w$*{}\s,]+?)\s*\bfrom\s*['"]([^'"\n]+)['"]"#)
        .expect("static regex")
});
static SIDE_EFFECT_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bimport\s*['"]([^'"\n]+)['"]"#).expect("static regex"));
static RE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\bexport\s+(?:type\s+)?(\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"]([^'"\n]+)['"]"#,
    )
    .expect("static regex")
});
static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"`]([^'"`\n$]+)['"`]\s*\)"#).expect("static regex")
});
static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("static regex")
});

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bexport\s+(?:declare\s+)?(default\s+)?(?:async\s+)?(?:abstract\s+)?(?:function\s*\*?|class|const|let|var|enum|interface|type|namespace)\s+([\w$]+)",
    )
    .expect("static regex")
});
static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+default\b").expect("static regex"));
static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+(?:type\s+)?\{([^}]*)\}").expect("static regex"));
static EXPORT_STAR_AS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s*\*\s*as\s+([\w$]+)\s*from\b").expect("static regex"));
static EXPORT_STAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s*\*\s*from\s*['"]([^'"\n]+)['"]"#).expect("static regex")
});
static OPAQUE_EXPORTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bmodule\.exports\b|\bexports\.[\w$]+\s*=|\bexport\s+(?:const|let|var)\s*[{\[]")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Static,
    SideEffect,
    ReExport,
    Dynamic,
    Require,
}

/// One import-like reference in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    pub kind: ImportKind,
    pub line: usize,
    /// Names the importer expects the target to export (`default` for default imports)
    pub names: Vec<String>,
}

/// Split a `{ a, b as c, type d }` list into `(source_name, local_name)` pairs.
fn named_list(list: &str) -> Vec<(String, String)> {
    list.trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("type ").unwrap_or(item).trim();
            if item.is_empty() {
                return None;
            }
            match item.split_once(" as ") {
                Some((source, local)) => {
                    Some((source.trim().to_string(), local.trim().to_string()))
                }
                None => Some((item.to_string(), item.to_string())),
            }
        })
        .collect()
}

/// Names requested by an import clause such as `React, { useState }`.
fn imported_names(clause: &str) -> Vec<String> {
    let mut names = Vec::new();
    let clause = clause.trim();
    let (before_brace, braces) = match clause.find('{') {
        Some(idx) => (&clause[..idx], Some(&clause[idx..])),
        None => (clause, None),
    };
    let default = before_brace.trim().trim_end_matches(',').trim();
    if !default.is_empty() && !default.starts_with('*') {
        names.push("default".to_string());
    }
    if let Some(braces) = braces {
        names.extend(named_list(braces).into_iter().map(|(source, _)| source));
    }
    names
}

/// Every import reference in `code`, ordered by position. `code` must already be
/// comment-stripped.
#[must_use]
pub fn extract_imports(code: &str) -> Vec<ImportRef> {
    let mut found: Vec<(usize, ImportRef)> = Vec::new();
    let mut push = |offset: usize, specifier: &str, kind: ImportKind, names: Vec<String>| {
        found.push((
            offset,
            ImportRef {
                specifier: specifier.to_string(),
                kind,
                line: line_of(code, offset),
                names,
            },
        ));
    };

    for caps in STATIC_IMPORT.captures_iter(code) {
        let offset = caps.get(0).map_or(0, |m| m.start());
        push(offset, &caps[3], ImportKind::Static, imported_names(&caps[2]));
    }
    for caps in SIDE_EFFECT_IMPORT.captures_iter(code) {
        let offset = caps.get(0).map_or(0, |m| m.start());
        push(offset, &caps[1], ImportKind::SideEffect, Vec::new());
    }
    for caps in RE_EXPORT.captures_iter(code) {
        let offset = caps.get(0).map_or(0, |m| m.start());
        let clause = &caps[1];
        let names = if clause.starts_with('{') {
            named_list(clause).into_iter().map(|(source, _)| source).collect()
        } else {
            Vec::new()
        };
        push(offset, &caps[2], ImportKind::ReExport, names);
    }
    for caps in DYNAMIC_IMPORT.captures_iter(code) {
        let offset = caps.get(0).map_or(0, |m| m.start());
        push(offset, &caps[1], ImportKind::Dynamic, Vec::new());
    }
    for caps in REQUIRE_CALL.captures_iter(code) {
        let offset = caps.get(0).map_or(0, |m| m.start());
        push(offset, &caps[1], ImportKind::Require, Vec::new());
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, import)| import).collect()
}

/// What a module exports, as far as static text tells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportInfo {
    pub names: BTreeSet<String>,
    /// Specifiers of `export * from '...'`
    pub star_sources: Vec<String>,
    /// Exports that cannot be enumerated statically (CommonJS, destructured declarations)
    pub opaque: bool,
}

#[must_use]
pub fn extract_exports(code: &str) -> ExportInfo {
    let mut info = ExportInfo::default();

    for caps in EXPORT_DECL.captures_iter(code) {
        if caps.get(1).is_some() {
            info.names.insert("default".to_string());
        }
        info.names.insert(caps[2].to_string());
    }
    if EXPORT_DEFAULT.is_match(code) {
        info.names.insert("default".to_string());
    }
    for caps in EXPORT_LIST.captures_iter(code) {
        info.names
            .extend(named_list(&caps[1]).into_iter().map(|(_, exported)| exported));
    }
    for caps in EXPORT_STAR_AS.captures_iter(code) {
        info.names.insert(caps[1].to_string());
    }
    for caps in EXPORT_STAR.captures_iter(code) {
        info.star_sources.push(caps[1].to_string());
    }
    info.opaque = OPAQUE_EXPORTS.is_match(code);
    info
}
