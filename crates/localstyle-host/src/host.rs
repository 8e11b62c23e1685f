//! Collaborator traits the collector consumes from its host.
//!
//! The host owns the project model, the incremental source index, the
//! document commit machinery, and the class and injection services. The
//! collector only reads through these traits.

use crate::model::{
    ComponentClass, Document, Element, FileRef, InjectedFragment, InjectionHost, ModuleNature,
    Scope,
};
use crate::HostError;
use localstyle_schema::{ClassName, FileId, ModuleName};
use std::sync::{mpsc, Arc};

/// Task posted to the host's serialized execution context.
pub type Task = Box<dyn FnOnce(&dyn SourceModel) + Send>;

/// Callback run once every pending edit has been committed.
pub type CommitCallback = Box<dyn FnOnce() + Send>;

pub trait ProjectModel: Send + Sync {
    fn nature(&self, module: &ModuleName) -> Result<ModuleNature, HostError>;

    fn is_application(&self, module: &ModuleName) -> Result<bool, HostError> {
        Ok(self.nature(module)? == ModuleNature::Application)
    }

    /// Source roots of the module, excluding test roots.
    fn source_roots(&self, module: &ModuleName) -> Result<Vec<FileId>, HostError>;

    fn find_child(&self, dir: &FileId, name: &str) -> Option<FileRef>;

    fn document(&self, file: &FileId) -> Option<Arc<Document>>;

    fn dependency_scope(&self, module: &ModuleName) -> Scope {
        Scope::ModuleWithDependencies(module.clone())
    }

    fn own_scope(&self, module: &ModuleName) -> Scope {
        Scope::ModuleOnly(module.clone())
    }
}

/// Freshness, commit, and read-access signals of the host's source model.
pub trait SourceModel: Send + Sync {
    fn is_index_stale(&self) -> bool;

    /// Block until the index rebuild in progress has finished.
    fn await_index_ready(&self);

    fn has_uncommitted_edits(&self) -> bool;

    /// Run `callback` once all pending edits are committed. May run it
    /// immediately when nothing is pending.
    fn on_all_committed(&self, callback: CommitCallback);

    /// Schedule `task` on the serialized execution context.
    fn invoke_later(&self, task: Task);

    /// Whether the calling thread currently holds read access.
    fn is_read_access_allowed(&self) -> bool;

    fn acquire_read(&self);

    fn release_read(&self);

    /// Block until all pending edits are committed.
    ///
    /// Posts a task to the serialized context that registers a commit
    /// callback, then waits for that callback on the calling thread. Must
    /// not be called while holding read access: the commit needs write
    /// access and would never run.
    fn flush_and_wait(&self) -> Result<(), HostError> {
        let (tx, rx) = mpsc::channel::<()>();
        self.invoke_later(Box::new(move |model| {
            model.on_all_committed(Box::new(move || {
                let _ = tx.send(());
            }));
        }));
        rx.recv().map_err(|_| HostError::ExecutorUnavailable)
    }
}

pub trait ClassIndex: Send + Sync {
    fn find_class(&self, name: &ClassName, scope: &Scope) -> Option<ComponentClass>;

    /// Transitive inheritors of `base` that belong to `scope`, in search order.
    fn find_inheritors<'a>(
        &'a self,
        base: &ComponentClass,
        include_self: bool,
        scope: &Scope,
    ) -> Box<dyn Iterator<Item = ComponentClass> + 'a>;
}

pub trait ReferenceResolver: Send + Sync {
    /// Resolve a file reference written in `from` to the file it names.
    fn resolve_reference(&self, from: &FileId, value: &str) -> Option<FileRef>;
}

pub trait InjectionService: Send + Sync {
    fn injection_host(&self, document: &Document, tag: &Element) -> Option<InjectionHost>;

    fn injected_fragments(&self, host: &InjectionHost) -> Vec<InjectedFragment>;

    /// File that ultimately hosts an injected document. Identity for
    /// ordinary documents.
    fn top_level_file(&self, document: &Document) -> FileRef;
}

/// Everything the collector needs from its host.
pub trait Host: ProjectModel + SourceModel + ClassIndex + ReferenceResolver + InjectionService {}

impl<T> Host for T where
    T: ProjectModel + SourceModel + ClassIndex + ReferenceResolver + InjectionService
{
}
