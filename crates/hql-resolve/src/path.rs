//! Specifier classification and local path resolution (spec.md §4.6).

use std::path::{Path, PathBuf};

/// What kind of specifier an import path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    Local,
    Npm,
    Jsr,
    Node,
    Http,
}

pub fn classify(specifier: &str) -> SpecifierKind {
    if let Some(rest) = specifier.strip_prefix("npm:") {
        let _ = rest;
        SpecifierKind::Npm
    } else if specifier.starts_with("jsr:") {
        SpecifierKind::Jsr
    } else if specifier.starts_with("node:") {
        SpecifierKind::Node
    } else if specifier.starts_with("http://") || specifier.starts_with("https://") {
        SpecifierKind::Http
    } else {
        SpecifierKind::Local
    }
}

pub fn is_remote(specifier: &str) -> bool {
    !matches!(classify(specifier), SpecifierKind::Local)
}

/// For `npm:<pkg>` specifiers, the fallback chain of mirror URLs to try in
/// order, first success wins (spec.md §4.6 "npm mirror fallback").
pub fn npm_mirror_chain(specifier: &str) -> Vec<String> {
    let pkg = specifier.strip_prefix("npm:").unwrap_or(specifier);
    vec![
        format!("https://registry.npmjs.org/{pkg}"),
        format!("https://esm.sh/{pkg}"),
        format!("https://cdn.skypack.dev/{pkg}"),
    ]
}

/// Resolves a local import path against the four-step search order:
/// importer's directory, the compilation's `source_dir`, the current
/// working directory, and `cwd/lib`. Returns the first candidate that
/// exists on disk.
pub fn resolve_local(
    specifier: &str,
    importer_dir: &Path,
    source_dir: &Path,
    cwd: &Path,
) -> Option<PathBuf> {
    let candidates = [
        importer_dir.join(specifier),
        source_dir.join(specifier),
        cwd.join(specifier),
        cwd.join("lib").join(specifier),
    ];
    candidates.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_remote_prefixes() {
        assert_eq!(classify("npm:lodash"), SpecifierKind::Npm);
        assert_eq!(classify("jsr:@std/fs"), SpecifierKind::Jsr);
        assert_eq!(classify("node:fs"), SpecifierKind::Node);
        assert_eq!(classify("https://example.com/x.js"), SpecifierKind::Http);
        assert_eq!(classify("./util.hql"), SpecifierKind::Local);
    }

    #[test]
    fn npm_chain_tries_original_then_mirrors() {
        let chain = npm_mirror_chain("npm:lodash");
        assert_eq!(
            chain,
            vec![
                "https://registry.npmjs.org/lodash".to_string(),
                "https://esm.sh/lodash".to_string(),
                "https://cdn.skypack.dev/lodash".to_string(),
            ]
        );
    }

    #[test]
    fn resolve_local_checks_importer_dir_first() {
        let dir = std::env::temp_dir().join("hql-resolve-test-importer-dir");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("x.hql");
        std::fs::write(&file, "").unwrap();
        let found = resolve_local(
            "x.hql",
            &dir,
            Path::new("/nonexistent-source-dir"),
            Path::new("/nonexistent-cwd"),
        );
        assert_eq!(found, Some(file));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn resolve_local_returns_none_when_nothing_matches() {
        let found = resolve_local(
            "missing.hql",
            Path::new("/nonexistent-a"),
            Path::new("/nonexistent-b"),
            Path::new("/nonexistent-c"),
        );
        assert_eq!(found, None);
    }
}
