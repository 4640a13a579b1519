//! The recursive resolver driver (spec.md §4.6): walks `import` forms,
//! builds a [`ModuleGraph`], and marks in-progress files to break cycles.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hql_common::module_graph::{ModuleGraph, ModuleId, ModuleKind};
use hql_common::{ImportError, ImportErrorKind};

use crate::import::{parse_import, ImportSpec};
use crate::path::{classify, npm_mirror_chain, resolve_local, SpecifierKind};

/// Loads the text of a remote module. Implemented as a trait with a native
/// `async fn` rather than `dyn RemoteLoader`, since async trait methods
/// aren't object-safe without pulling in `async-trait`.
#[allow(async_fn_in_trait)]
pub trait RemoteLoader {
    async fn load(&self, url: &str) -> Result<String, ImportError>;
}

/// A `RemoteLoader` that always fails; used where remote resolution is not
/// available (tests, or a `hqlc` invocation with no network access).
pub struct NoRemoteLoader;

impl RemoteLoader for NoRemoteLoader {
    async fn load(&self, url: &str) -> Result<String, ImportError> {
        Err(ImportError {
            kind: ImportErrorKind::RemoteUnreachable,
            path: url.to_string(),
            source_file: String::new(),
        })
    }
}

/// Keys the graph/visiting-set by canonicalized path so the same file
/// reached through two different relative specifiers is recognized as one
/// module rather than re-resolved.
fn canonical_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

pub struct ResolveOptions {
    pub source_dir: PathBuf,
    pub cwd: PathBuf,
}

/// Resolves all local and remote modules transitively reachable from
/// `entry`, returning the populated [`ModuleGraph`]. `read_source` loads the
/// text of a local file (injectable for testing without real file I/O).
pub struct Resolver<'a, L: RemoteLoader> {
    pub options: &'a ResolveOptions,
    pub loader: &'a L,
    graph: ModuleGraph,
    visiting: HashSet<String>,
}

impl<'a, L: RemoteLoader> Resolver<'a, L> {
    pub fn new(options: &'a ResolveOptions, loader: &'a L) -> Self {
        Self {
            options,
            loader,
            graph: ModuleGraph::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn into_graph(self) -> ModuleGraph {
        self.graph
    }

    /// Resolve the module graph rooted at `entry_specifier`, whose already-
    /// parsed source text is `entry_source`. `read_source` reads the text of
    /// a resolved local path.
    pub async fn resolve_entry(
        &mut self,
        entry_specifier: &str,
        entry_path: PathBuf,
        entry_source: &str,
        read_source: &impl Fn(&Path) -> std::io::Result<String>,
    ) -> Result<ModuleId, ImportError> {
        let key = canonical_key(&entry_path);
        let id = self
            .graph
            .add_module(key.clone(), Some(entry_path.clone()), ModuleKind::Local, true);
        self.visiting.insert(key.clone());
        self.process_imports(entry_specifier, &entry_path, entry_source, id, read_source)
            .await?;
        self.visiting.remove(&key);
        Ok(id)
    }

    /// Walks every `(import ...)` top-level form in `source`, resolving and
    /// recursing into each target module.
    async fn process_imports(
        &mut self,
        importer_specifier: &str,
        importer_path: &Path,
        source: &str,
        importer_id: ModuleId,
        read_source: &impl Fn(&Path) -> std::io::Result<String>,
    ) -> Result<(), ImportError> {
        let mut registry = hql_common::SourceRegistry::new();
        let (_, forms) = hql_parser::parse_source(&mut registry, importer_specifier, source)
            .map_err(|_| ImportError {
                kind: ImportErrorKind::NotFound,
                path: importer_specifier.to_string(),
                source_file: importer_specifier.to_string(),
            })?;

        let importer_dir = importer_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut local_specs = Vec::new();
        let mut remote_specs = Vec::new();
        for form in &forms {
            if !form.head_is("import") {
                continue;
            }
            let spec = parse_import(form, importer_specifier)?;
            if classify(&spec.path) == SpecifierKind::Local {
                local_specs.push(spec);
            } else {
                remote_specs.push(spec);
            }
        }

        // Local imports process sequentially for deterministic macro visibility.
        for spec in local_specs {
            self.resolve_local_import(importer_specifier, &importer_dir, importer_id, &spec, read_source)
                .await?;
        }

        // Remote imports are independent; spec calls for parallel dispatch.
        let remote_results = futures_join_all(
            remote_specs
                .iter()
                .map(|spec| self.resolve_remote_import(importer_specifier, importer_id, spec)),
        )
        .await;
        for result in remote_results {
            result?;
        }

        Ok(())
    }

    async fn resolve_local_import(
        &mut self,
        importer_specifier: &str,
        importer_dir: &Path,
        importer_id: ModuleId,
        spec: &ImportSpec,
        read_source: &impl Fn(&Path) -> std::io::Result<String>,
    ) -> Result<(), ImportError> {
        let resolved_path = resolve_local(
            &spec.path,
            importer_dir,
            &self.options.source_dir,
            &self.options.cwd,
        )
        .ok_or_else(|| ImportError {
            kind: ImportErrorKind::NotFound,
            path: spec.path.clone(),
            source_file: importer_specifier.to_string(),
        })?;
        let key = canonical_key(&resolved_path);

        if let Some(existing) = self.graph.resolve(&key) {
            self.graph.add_dependency(importer_id, existing);
            return Ok(());
        }
        if self.visiting.contains(&key) {
            // In-progress: trust the outer call to finish populating exports.
            return Ok(());
        }

        let text = read_source(&resolved_path).map_err(|_| ImportError {
            kind: ImportErrorKind::NotFound,
            path: spec.path.clone(),
            source_file: importer_specifier.to_string(),
        })?;

        let id = self
            .graph
            .add_module(key.clone(), Some(resolved_path.clone()), ModuleKind::Local, false);
        self.graph.add_dependency(importer_id, id);
        self.visiting.insert(key.clone());
        Box::pin(self.process_imports(&spec.path, &resolved_path, &text, id, read_source)).await?;
        self.visiting.remove(&key);
        Ok(())
    }

    async fn resolve_remote_import(
        &self,
        importer_specifier: &str,
        _importer_id: ModuleId,
        spec: &ImportSpec,
    ) -> Result<(), ImportError> {
        let kind = classify(&spec.path);
        if kind == SpecifierKind::Npm {
            let mut last_err = None;
            for mirror in npm_mirror_chain(&spec.path) {
                match self.loader.load(&mirror).await {
                    Ok(_) => return Ok(()),
                    Err(e) => last_err = Some(e),
                }
            }
            return Err(last_err.unwrap_or(ImportError {
                kind: ImportErrorKind::RemoteUnreachable,
                path: spec.path.clone(),
                source_file: importer_specifier.to_string(),
            }));
        }
        self.loader.load(&spec.path).await.map(|_| ())
    }
}

/// Minimal in-crate replacement for `futures::future::join_all`, since the
/// dependency stack carries `tokio` but not `futures`.
async fn futures_join_all<F, T>(futs: impl Iterator<Item = F>) -> Vec<T>
where
    F: std::future::Future<Output = T>,
{
    let handles: Vec<_> = futs.collect();
    let mut out = Vec::with_capacity(handles.len());
    for f in handles {
        out.push(f.await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ResolveOptions {
        ResolveOptions {
            source_dir: PathBuf::from("/src"),
            cwd: PathBuf::from("/cwd"),
        }
    }

    #[tokio::test]
    async fn resolves_a_simple_local_chain() {
        let dir = std::env::temp_dir().join("hql-resolve-chain-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("b.hql"), "(let y 2)").unwrap();

        let entry_source = "(import \"./b.hql\")";
        let opts = ResolveOptions {
            source_dir: dir.clone(),
            cwd: dir.clone(),
        };
        let loader = NoRemoteLoader;
        let mut resolver = Resolver::new(&opts, &loader);
        let read = |p: &Path| std::fs::read_to_string(p);
        resolver
            .resolve_entry("a.hql", dir.join("a.hql"), &entry_source, &read)
            .await
            .unwrap();
        let graph = resolver.into_graph();
        assert_eq!(graph.module_count(), 2);
        assert!(graph.resolve(&canonical_key(&dir.join("b.hql"))).is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_local_import_is_not_found() {
        let opts = options();
        let loader = NoRemoteLoader;
        let mut resolver = Resolver::new(&opts, &loader);
        let read = |p: &Path| std::fs::read_to_string(p);
        let err = resolver
            .resolve_entry(
                "a.hql",
                PathBuf::from("/cwd/a.hql"),
                "(import \"./missing.hql\")",
                &read,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ImportErrorKind::NotFound);
    }

    #[tokio::test]
    async fn circular_local_imports_resolve_without_recursing_forever() {
        let dir = std::env::temp_dir().join("hql-resolve-cycle-test");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.hql"), "(import \"./b.hql\")").unwrap();
        std::fs::write(dir.join("b.hql"), "(import \"./a.hql\")").unwrap();

        let opts = ResolveOptions {
            source_dir: dir.clone(),
            cwd: dir.clone(),
        };
        let loader = NoRemoteLoader;
        let mut resolver = Resolver::new(&opts, &loader);
        let read = |p: &Path| std::fs::read_to_string(p);
        let a_source = std::fs::read_to_string(dir.join("a.hql")).unwrap();
        resolver
            .resolve_entry("a.hql", dir.join("a.hql"), &a_source, &read)
            .await
            .unwrap();
        let graph = resolver.into_graph();
        assert_eq!(graph.module_count(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
