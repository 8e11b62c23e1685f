//! Host collaborators for localstyle collection.
//!
//! This crate describes everything the collector consumes but does not own:
//! the project/module model, the source index freshness and document commit
//! signals, read access, class-hierarchy search, reference resolution,
//! language injection, and the stylesheet compiler with its output sinks. It
//! also ships `InMemoryHost`, a complete thread-safe implementation loaded
//! from JSON fixtures, and `TextCssCompiler`, a reference compiler.

pub mod compiler;
pub mod fixture;
pub mod host;
pub mod memory;
pub mod model;

pub use compiler::{
    AssetCounter, ComponentReferenceCounter, StringRegistry, StyleCompiler, TextCssCompiler,
    WriterSinks, NO_CONDITION,
};
pub use fixture::Fixture;
pub use host::{
    ClassIndex, CommitCallback, Host, InjectionService, ProjectModel, ReferenceResolver,
    SourceModel, Task,
};
pub use memory::{InMemoryHost, ModuleInfo};
pub use model::{
    ComponentClass, Document, DocumentKind, Element, ElementId, FileRef, InjectedFragment,
    InjectionHost, ModuleNature, Scope, Shred,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown module: {0}")]
    UnknownModule(String),
    #[error("failed to compile stylesheet '{file}': {message}")]
    Compile { file: String, message: String },
    #[error("serialized execution context is not running")]
    ExecutorUnavailable,
    #[error("invalid fixture: {0}")]
    Fixture(String),
    #[error("failed to parse fixture: {0}")]
    Json(#[from] serde_json::Error),
}
