//! Routing integrity, route contract coverage and generic route detection

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::issue::{ArtifactIssue, IssueCategory};
use crate::paths;
use crate::source::{line_of, strip_comments};

use super::RuleContext;

const ROUTER_PACKAGES: [&str; 4] = [
    "react-router-dom",
    "react-router",
    "@tanstack/react-router",
    "wouter",
];

const GENERIC_ROUTES: &[&str] = &[
    "",
    "home",
    "index",
    "about",
    "contact",
    "dashboard",
    "settings",
    "profile",
    "login",
    "logout",
    "signin",
    "sign-in",
    "register",
    "signup",
    "sign-up",
    "help",
    "faq",
    "404",
    "*",
    "not-found",
    "notfound",
];

static PROVIDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:BrowserRouter|HashRouter|MemoryRouter|StaticRouter|RouterProvider|Router)\b")
        .expect("static regex")
});
static ROUTE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Route\b|</Route\s*>").expect("static regex"));
static PATH_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bpath\s*=\s*(?:"([^"]*)"|'([^']*)'|\{\s*["'`]([^"'`]*)["'`]\s*\})"#)
        .expect("static regex")
});
static INDEX_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bindex\b(?:\s*=\s*\{\s*true\s*\})?").expect("static regex"));
static PATH_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bpath\s*:\s*["'`]([^"'`]*)["'`]"#).expect("static regex")
});
static ROUTE_OBJECT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bcreate(?:Browser|Hash|Memory)Router\b|\buseRoutes\b|\bRouteObject\b|\bchildren\s*:\s*\[")
        .expect("static regex")
});

/// Required route paths from an upstream contract document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteContract {
    pub routes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContractEntry {
    Path(String),
    Object { path: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContractDocument {
    List(Vec<ContractEntry>),
    Object { routes: Vec<ContractEntry> },
}

impl RouteContract {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(Into::into).collect(),
        }
    }

    /// Accepts `["/a", ...]`, `[{"path": "/a"}, ...]` or `{"routes": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries = match serde_json::from_str::<ContractDocument>(json)? {
            ContractDocument::List(entries) | ContractDocument::Object { routes: entries } => {
                entries
            }
        };
        Ok(Self::new(entries.into_iter().map(|entry| match entry {
            ContractEntry::Path(path) | ContractEntry::Object { path } => path,
        })))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// A route path defined in a module, with nesting already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDef {
    pub file: String,
    pub path: String,
}

fn compose(parent: &str, child: &str) -> String {
    if child.starts_with('/') {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), child)
    }
}

/// End of a JSX opening tag starting at `start`, and whether it is self-closing.
fn tag_end(code: &str, start: usize) -> Option<(usize, bool)> {
    let bytes = code.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    for i in start + 1..bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'>' if depth == 0 => {
                let self_closing = code[..i].trim_end().ends_with('/');
                return Some((i + 1, self_closing));
            }
            _ => {}
        }
    }
    None
}

/// Paths declared with `<Route path=...>` elements, nested by element structure.
#[must_use]
pub fn jsx_routes(code: &str) -> Vec<String> {
    let mut routes = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut cursor = 0;

    while let Some(m) = ROUTE_TAG.find_at(code, cursor) {
        cursor = m.end();
        if m.as_str().starts_with("</") {
            stack.pop();
            continue;
        }
        let Some((end, self_closing)) = tag_end(code, m.start()) else {
            break;
        };
        let attrs = &code[m.end()..end];
        let parent = stack.last().map_or("", String::as_str);
        let declared = PATH_ATTR.captures(attrs).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|p| p.as_str().to_string())
        });
        let full = match &declared {
            Some(path) => {
                let full = compose(parent, path);
                routes.push(full.clone());
                full
            }
            None => {
                if INDEX_ATTR.is_match(attrs) {
                    routes.push(if parent.is_empty() { "/".to_string() } else { parent.to_string() });
                }
                parent.to_string()
            }
        };
        if !self_closing {
            stack.push(full);
        }
        cursor = end;
    }
    routes
}

/// Paths declared in route objects (`{ path: 'x', children: [...] }`).
#[must_use]
pub fn object_routes(path: &str, code: &str) -> Vec<String> {
    let looks_like_routes = ROUTE_OBJECT_HINT.is_match(code)
        || paths::file_name(path).to_ascii_lowercase().contains("route");
    if !looks_like_routes {
        return Vec::new();
    }

    let keys: Vec<(usize, usize, String)> = PATH_KEY
        .captures_iter(code)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps[1].to_string()))
        })
        .collect();
    if keys.is_empty() {
        return Vec::new();
    }

    let bytes = code.as_bytes();
    let mut routes = Vec::new();
    let mut frames: Vec<Option<String>> = Vec::new();
    let mut next_key = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        while next_key < keys.len() && keys[next_key].0 < i {
            next_key += 1;
        }
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if next_key < keys.len() && keys[next_key].0 == i {
            let (_, end, declared) = &keys[next_key];
            let depth = frames.len();
            let parent = frames[..depth.saturating_sub(1)]
                .iter()
                .rev()
                .find_map(|f| f.as_deref())
                .unwrap_or("");
            let full = compose(parent, declared);
            routes.push(full.clone());
            if let Some(frame) = frames.last_mut() {
                *frame = Some(full);
            }
            i = *end;
            next_key += 1;
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' => frames.push(None),
            b'}' => {
                frames.pop();
            }
            _ => {}
        }
        i += 1;
    }
    routes
}

/// Normalized path segments: lowercase, no empty segments, params collapsed to `:param`.
#[must_use]
pub fn route_segments(path: &str) -> Vec<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.to_lowercase()
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(|segment| {
            let is_param = segment.starts_with(':')
                || segment.starts_with('$')
                || (segment.starts_with('{') && segment.ends_with('}'))
                || (segment.starts_with('[') && segment.ends_with(']'));
            if is_param {
                ":param".to_string()
            } else {
                segment.to_string()
            }
        })
        .collect()
}

fn segments_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let plural_of = |singular: &str, plural: &str| {
        plural == format!("{singular}s")
            || plural == format!("{singular}es")
            || singular
                .strip_suffix('y')
                .is_some_and(|stem| plural == format!("{stem}ies"))
    };
    a != ":param" && b != ":param" && (plural_of(a, b) || plural_of(b, a))
}

/// Equivalence used for contract coverage: trailing slashes, absolute vs relative
/// nesting, parameter spelling and simple singular/plural variants are ignored.
#[must_use]
pub fn routes_equivalent(a: &str, b: &str) -> bool {
    let a = route_segments(a);
    let b = route_segments(b);
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| segments_match(x, y))
}

fn is_generic(path: &str, extra: &BTreeSet<String>) -> bool {
    let segments = route_segments(path);
    segments.is_empty()
        || segments
            .iter()
            .all(|s| GENERIC_ROUTES.contains(&s.as_str()) || extra.contains(s))
}

struct RouteInventory {
    providers: Vec<(String, usize)>,
    routes: Vec<RouteDef>,
}

impl RouteInventory {
    fn collect(ctx: &RuleContext<'_>) -> Self {
        let mut providers = Vec::new();
        let mut routes = Vec::new();
        for module in ctx.modules() {
            for m in PROVIDER.find_iter(&module.code) {
                providers.push((module.path.clone(), line_of(&module.code, m.start())));
            }
            let mut paths = jsx_routes(&module.code);
            paths.extend(object_routes(&module.path, &module.code));
            routes.extend(paths.into_iter().map(|path| RouteDef {
                file: module.path.clone(),
                path,
            }));
        }
        Self { providers, routes }
    }
}

/// Routing is expected when a router package is declared or any in-scope file,
/// reachable or not, defines routes.
fn routing_expected(ctx: &RuleContext<'_>) -> bool {
    let declared = ctx
        .project
        .manifest
        .as_ref()
        .is_some_and(|m| ROUTER_PACKAGES.iter().any(|p| m.declares(p)));
    declared
        || ctx.tree.iter().any(|(path, content)| {
            paths::is_source_file(path)
                && ctx.project.in_scope(path)
                && !ctx.graph.is_reachable(path)
                && {
                    let code = strip_comments(content);
                    PROVIDER.is_match(&code) || !jsx_routes(&code).is_empty()
                }
        })
}

/// Router mounted exactly once, and the entry actually renders a routed shell.
pub fn check_integrity(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let inventory = RouteInventory::collect(ctx);
    let mut issues = Vec::new();

    if inventory.providers.len() > 1 {
        let mounts = inventory
            .providers
            .iter()
            .map(|(file, line)| format!("{file}:{line}"))
            .collect::<Vec<_>>()
            .join(", ");
        issues.push(ArtifactIssue::in_file(
            IssueCategory::Routing,
            &inventory.providers[1].0,
            format!("nested router providers: router is mounted more than once ({mounts})"),
        ));
    }

    if inventory.routes.is_empty() {
        if routing_expected(ctx) {
            issues.push(ArtifactIssue::in_file(
                IssueCategory::Routing,
                &ctx.project.entry,
                "entry does not mount a routed app shell",
            ));
        }
    } else if inventory.providers.is_empty() {
        issues.push(ArtifactIssue::in_file(
            IssueCategory::Routing,
            &inventory.routes[0].file,
            "routes are defined but no router provider is mounted",
        ));
    }
    issues
}

/// Every contract path must be implemented.
pub fn check_contract(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let Some(contract) = &ctx.options.route_contract else {
        return Vec::new();
    };
    let inventory = RouteInventory::collect(ctx);
    contract
        .routes
        .iter()
        .filter(|required| {
            !inventory
                .routes
                .iter()
                .any(|route| routes_equivalent(&route.path, required))
        })
        .map(|required| {
            ArtifactIssue::new(
                IssueCategory::RouteContract,
                format!("required route '{required}' is not implemented"),
                None,
            )
        })
        .collect()
}

/// A route set made only of generic navigation labels.
pub fn check_generic(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let inventory = RouteInventory::collect(ctx);
    if inventory.routes.is_empty() {
        return Vec::new();
    }
    let extra: BTreeSet<String> = ctx
        .options
        .extra_generic_routes
        .iter()
        .map(|r| r.trim().trim_matches('/').to_lowercase())
        .collect();
    if !inventory.routes.iter().all(|r| is_generic(&r.path, &extra)) {
        return Vec::new();
    }
    let labels: BTreeSet<String> = inventory
        .routes
        .iter()
        .map(|r| format!("/{}", route_segments(&r.path).join("/")))
        .collect();
    vec![ArtifactIssue::in_file(
        IssueCategory::GenericRoutes,
        &inventory.routes[0].file,
        format!(
            "route set contains only generic routes ({}) with no business-specific paths",
            labels.into_iter().collect::<Vec<_>>().join(", ")
        ),
    )]
}
