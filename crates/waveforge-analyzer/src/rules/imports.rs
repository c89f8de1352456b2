use crate::imports::ImportKind;
use crate::issue::{ArtifactIssue, IssueCategory};
use crate::paths;
use crate::resolve::Resolution;

use super::RuleContext;

/// Every reachable import must resolve, and named imports from local modules must be
/// exported by the target (through `export *` chains).
pub fn check(ctx: &RuleContext<'_>) -> Vec<ArtifactIssue> {
    let mut issues = Vec::new();
    for module in ctx.modules() {
        for resolved in &module.imports {
            let import = &resolved.import;
            match &resolved.resolution {
                Resolution::Unresolved => issues.push(ArtifactIssue::in_file(
                    IssueCategory::UnresolvedImport,
                    &module.path,
                    format!(
                        "unresolved import '{}' at line {}",
                        import.specifier, import.line
                    ),
                )),
                Resolution::File(target)
                    if paths::is_source_file(target)
                        && !import.names.is_empty()
                        && matches!(import.kind, ImportKind::Static | ImportKind::ReExport) =>
                {
                    let Some(exported) = ctx.graph.exports_of(ctx.resolver, target) else {
                        continue;
                    };
                    for name in import.names.iter().filter(|n| !exported.contains(*n)) {
                        issues.push(ArtifactIssue::in_file(
                            IssueCategory::UnresolvedImport,
                            &module.path,
                            format!(
                                "'{name}' is not exported by '{}' (resolved to {target}) at line {}",
                                import.specifier, import.line
                            ),
                        ));
                    }
                }
                _ => {}
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use crate::IssueCategory;
    use crate::rules::test_support::{PACKAGE_JSON, analyze, of};

    #[test]
    fn test_reports_missing_relative_and_package_imports() {
        let issues = analyze(&[
            ("package.json", PACKAGE_JSON),
            (
                "src/main.tsx",
                "import { createRoot } from 'react-dom/client'\nimport App from './App'\nimport axios from 'axios'\ncreateRoot(el).render(<App />)",
            ),
            ("src/App.tsx", "import Header from './components/Header'\nexport default function App() { return <Header /> }"),
        ]);
        let unresolved = of(&issues, IssueCategory::UnresolvedImport);
        assert_eq!(unresolved.len(), 2);
        assert!(unresolved[0].message.contains("'./components/Header'"));
        assert_eq!(unresolved[0].file_path.as_deref(), Some("src/App.tsx"));
        assert!(unresolved[1].message.contains("'axios'"));
        assert_eq!(unresolved[1].file_path.as_deref(), Some("src/main.tsx"));
    }

    #[test]
    fn test_alias_with_base_directory_resolves() {
        let issues = analyze(&[
            ("package.json", PACKAGE_JSON),
            (
                "vite.config.ts",
                "import { fileURLToPath, URL } from 'node:url'\nexport default { resolve: { alias: { '@': fileURLToPath(new URL('./src', import.meta.url)) } } }",
            ),
            ("src/main.tsx", "import { Button } from '@/components/ui'\nButton()"),
            ("src/components/ui/index.ts", "export * from './button'"),
            ("src/components/ui/button.tsx", "export function Button() { return <button onClick={go}>Go</button> }"),
        ]);
        assert!(of(&issues, IssueCategory::UnresolvedImport).is_empty(), "{issues:?}");
    }

    #[test]
    fn test_missing_export_through_barrel() {
        let issues = analyze(&[
            ("package.json", PACKAGE_JSON),
            ("src/main.tsx", "import { Card, Badge } from './ui'\n"),
            ("src/ui/index.ts", "export * from './card'"),
            ("src/ui/card.tsx", "export const Card = () => <div />"),
        ]);
        let unresolved = of(&issues, IssueCategory::UnresolvedImport);
        assert_eq!(unresolved.len(), 1);
        assert!(unresolved[0].message.contains("'Badge'"));
    }
}
