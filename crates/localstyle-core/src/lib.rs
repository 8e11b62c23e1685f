//! Local style collection for component UI modules.
//!
//! This crate walks the components of a module, finds their style tags, and
//! turns each one into a compiled [`LocalStyleHolder`]. Stylesheets that many
//! components reference by file are compiled once and shared through a
//! pass-scoped identity cache. Invalid references and stylesheets that fail
//! to compile become diagnostics in a [`ProblemsHolder`] rather than aborting
//! the pass. The collector waits for
//! a consistent source model and holds read access for the whole pass.

pub mod cache;
pub mod collector;
pub mod concurrency;
pub mod diagnostics;
pub mod extractor;
pub mod holder;
pub mod resolver;

pub use cache::{HolderId, IdentityCache, Lookup};
pub use collector::ModuleStyleCollector;
pub use concurrency::{wait_for_consistency, ReadSnapshot};
pub use diagnostics::{
    render_message, CurrentFileGuard, ElementLocation, InvalidProperty, Problem, ProblemsHolder,
    CSS_COMPILE_FAILED, EMBED_SOURCE_IS_NOT_CSS_FILE, EMBED_SOURCE_NOT_FOUND,
};
pub use extractor::StyleExtractor;
pub use holder::{LocalStyleHolder, LocalStyleKind};
pub use resolver::{StyleAttachment, StyleResolver};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema error: {0}")]
    Schema(#[from] localstyle_schema::SchemaError),
    #[error("host error: {0}")]
    Host(#[from] localstyle_host::HostError),
    #[error("invalid style property: {0}")]
    InvalidProperty(#[from] InvalidProperty),
    #[error("cannot wait for pending commits while holding read access")]
    CommitWaitUnderReadAccess,
    #[error("injection invariant violated: {0}")]
    InjectionInvariant(String),
}
