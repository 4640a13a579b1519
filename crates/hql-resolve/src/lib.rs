//! Module/import resolver (spec.md §4.6): parses `import` forms, resolves
//! local and remote specifiers, and builds the program's [`ModuleGraph`]
//! with in-progress cycle marking.

pub mod import;
pub mod path;
pub mod resolver;

pub use import::{Binding, ImportKind, ImportSpec};
pub use path::{classify, is_remote, resolve_local, SpecifierKind};
pub use resolver::{NoRemoteLoader, RemoteLoader, ResolveOptions, Resolver};
