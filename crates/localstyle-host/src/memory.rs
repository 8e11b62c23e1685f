use crate::host::{
    ClassIndex, CommitCallback, InjectionService, ProjectModel, ReferenceResolver, SourceModel,
    Task,
};
use crate::model::{
    ComponentClass, Document, Element, ElementId, FileRef, InjectedFragment, InjectionHost,
    ModuleNature, Scope, Shred,
};
use crate::HostError;
use localstyle_schema::{ClassName, FileId, ModuleName};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

/// Separator between a hosting file and the element index in the identity of
/// an injected fragment.
pub const FRAGMENT_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub nature: ModuleNature,
    pub source_roots: Vec<FileId>,
    pub dependencies: Vec<ModuleName>,
}

#[derive(Default)]
struct ProjectData {
    modules: BTreeMap<ModuleName, ModuleInfo>,
    documents: HashMap<FileId, Arc<Document>>,
    classes: Vec<ComponentClass>,
    fragment_overrides: HashMap<InjectionHost, Vec<InjectedFragment>>,
}

impl ProjectData {
    fn module_closure(&self, root: &ModuleName) -> HashSet<ModuleName> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(info) = self.modules.get(&name) {
                queue.extend(info.dependencies.iter().cloned());
            }
        }
        seen
    }

    fn scope_modules(&self, scope: &Scope) -> HashSet<ModuleName> {
        match scope {
            Scope::ModuleOnly(m) => HashSet::from([m.clone()]),
            Scope::ModuleWithDependencies(m) => self.module_closure(m),
        }
    }
}

#[derive(Default)]
struct Signals {
    indexing: bool,
    uncommitted: bool,
    commit_callbacks: Vec<CommitCallback>,
}

struct Inner {
    data: Mutex<ProjectData>,
    signals: Mutex<Signals>,
    index_ready: Condvar,
    readers: Mutex<HashMap<ThreadId, usize>>,
    read_acquisitions: AtomicUsize,
    executor: Mutex<Option<mpsc::Sender<Task>>>,
}

/// Thread-safe in-memory host.
///
/// Stands in for a real IDE or build host in tests and in the CLI. Cloning
/// yields another handle to the same project. The serialized execution
/// context is a dedicated worker thread started on first use; it exits once
/// every handle is dropped.
#[derive(Clone)]
pub struct InMemoryHost {
    inner: Arc<Inner>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                data: Mutex::new(ProjectData::default()),
                signals: Mutex::new(Signals::default()),
                index_ready: Condvar::new(),
                readers: Mutex::new(HashMap::new()),
                read_acquisitions: AtomicUsize::new(0),
                executor: Mutex::new(None),
            }),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}

fn parent(file: &str) -> &str {
    file.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolve `.` and `..` segments without touching any filesystem.
/// Returns `None` when `..` climbs above the project root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

fn find_element(root: &Element, id: ElementId) -> Option<&Element> {
    if root.id == id {
        return Some(root);
    }
    root.children.iter().find_map(|c| find_element(c, id))
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(
        &self,
        name: &str,
        nature: ModuleNature,
        source_roots: &[&str],
        dependencies: &[&str],
    ) {
        let info = ModuleInfo {
            nature,
            source_roots: source_roots.iter().copied().map(FileId::from).collect(),
            dependencies: dependencies.iter().copied().map(ModuleName::from).collect(),
        };
        lock(&self.inner.data)
            .modules
            .insert(ModuleName::new(name), info);
    }

    pub fn module(&self, name: &ModuleName) -> Option<ModuleInfo> {
        lock(&self.inner.data).modules.get(name).cloned()
    }

    pub fn add_document(&self, document: Document) {
        let id = document.file.id.clone();
        lock(&self.inner.data)
            .documents
            .insert(id, Arc::new(document));
    }

    pub fn add_markup(&self, path: &str, root: Element) {
        self.add_document(Document::markup(FileRef::new(path), Some(root)));
    }

    pub fn add_stylesheet(&self, path: &str, text: &str) {
        self.add_document(Document::stylesheet(FileRef::new(path), text));
    }

    pub fn add_file(&self, path: &str, text: &str) {
        self.add_document(Document::other(FileRef::new(path), text));
    }

    pub fn add_class(&self, class: ComponentClass) {
        lock(&self.inner.data).classes.push(class);
    }

    /// Declare a class. `file` is the document the class navigates to.
    pub fn declare_class(
        &self,
        name: &str,
        module: &str,
        super_class: Option<&str>,
        file: Option<&str>,
    ) {
        self.add_class(ComponentClass {
            name: ClassName::new(name),
            module: ModuleName::new(module),
            super_class: super_class.map(ClassName::from),
            file: file.map(FileId::from),
        });
    }

    /// Replace the fragments reported for `host`.
    pub fn override_fragments(&self, host: InjectionHost, fragments: Vec<InjectedFragment>) {
        lock(&self.inner.data)
            .fragment_overrides
            .insert(host, fragments);
    }

    pub fn start_indexing(&self) {
        lock(&self.inner.signals).indexing = true;
    }

    pub fn finish_indexing(&self) {
        lock(&self.inner.signals).indexing = false;
        self.inner.index_ready.notify_all();
    }

    pub fn mark_uncommitted(&self) {
        lock(&self.inner.signals).uncommitted = true;
    }

    /// Commit every pending edit and run the callbacks waiting for it.
    pub fn commit_all(&self) {
        let callbacks = {
            let mut signals = lock(&self.inner.signals);
            signals.uncommitted = false;
            std::mem::take(&mut signals.commit_callbacks)
        };
        debug!("committed pending edits, running {} callbacks", callbacks.len());
        for callback in callbacks {
            callback();
        }
    }

    /// Number of read-access holds currently open across all threads.
    pub fn active_readers(&self) -> usize {
        lock(&self.inner.readers).values().sum()
    }

    /// Total number of read-access acquisitions since creation.
    pub fn read_acquisitions(&self) -> usize {
        self.inner.read_acquisitions.load(Ordering::SeqCst)
    }

    fn spawn_executor(&self) -> mpsc::Sender<Task> {
        let (tx, rx) = mpsc::channel::<Task>();
        let weak = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name("localstyle-executor".to_owned())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    let Some(inner) = weak.upgrade() else {
                        break;
                    };
                    let host = InMemoryHost { inner };
                    task(&host as &dyn SourceModel);
                }
            });
        if let Err(e) = spawned {
            warn!("failed to start executor thread: {e}");
        }
        tx
    }

    fn fragment_for(&self, host: &InjectionHost) -> Option<InjectedFragment> {
        let document = self.document(&host.file)?;
        let element = find_element(document.root.as_ref()?, host.element)?;
        let text = element.text.as_deref()?;
        let id = format!("{}{FRAGMENT_SEPARATOR}{}", host.file, host.element);
        let is_css = element
            .language
            .as_deref()
            .is_none_or(|l| l.eq_ignore_ascii_case("css"));
        let injected = if is_css {
            Document::stylesheet(FileRef::new(id), text)
        } else {
            Document::other(FileRef::new(id), text)
        };
        Some(InjectedFragment {
            document: Arc::new(injected),
            shreds: vec![Shred {
                host: host.clone(),
                range: 0..text.len(),
            }],
        })
    }
}

impl ProjectModel for InMemoryHost {
    fn nature(&self, module: &ModuleName) -> Result<ModuleNature, HostError> {
        lock(&self.inner.data)
            .modules
            .get(module)
            .map(|m| m.nature)
            .ok_or_else(|| HostError::UnknownModule(module.to_string()))
    }

    fn source_roots(&self, module: &ModuleName) -> Result<Vec<FileId>, HostError> {
        lock(&self.inner.data)
            .modules
            .get(module)
            .map(|m| m.source_roots.clone())
            .ok_or_else(|| HostError::UnknownModule(module.to_string()))
    }

    fn find_child(&self, dir: &FileId, name: &str) -> Option<FileRef> {
        let id = FileId::new(join(dir, name));
        lock(&self.inner.data)
            .documents
            .get(&id)
            .map(|d| d.file.clone())
    }

    fn document(&self, file: &FileId) -> Option<Arc<Document>> {
        lock(&self.inner.data).documents.get(file).cloned()
    }
}

impl SourceModel for InMemoryHost {
    fn is_index_stale(&self) -> bool {
        lock(&self.inner.signals).indexing
    }

    fn await_index_ready(&self) {
        let mut signals = lock(&self.inner.signals);
        while signals.indexing {
            signals = self
                .inner
                .index_ready
                .wait(signals)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn has_uncommitted_edits(&self) -> bool {
        lock(&self.inner.signals).uncommitted
    }

    fn on_all_committed(&self, callback: CommitCallback) {
        let mut signals = lock(&self.inner.signals);
        if signals.uncommitted {
            signals.commit_callbacks.push(callback);
        } else {
            drop(signals);
            callback();
        }
    }

    fn invoke_later(&self, task: Task) {
        let mut executor = lock(&self.inner.executor);
        let sender = executor.get_or_insert_with(|| self.spawn_executor());
        if sender.send(task).is_err() {
            warn!("executor thread is gone; dropping task");
            *executor = None;
        }
    }

    fn is_read_access_allowed(&self) -> bool {
        lock(&self.inner.readers).contains_key(&thread::current().id())
    }

    fn acquire_read(&self) {
        *lock(&self.inner.readers)
            .entry(thread::current().id())
            .or_insert(0) += 1;
        self.inner.read_acquisitions.fetch_add(1, Ordering::SeqCst);
    }

    fn release_read(&self) {
        let mut readers = lock(&self.inner.readers);
        let id = thread::current().id();
        match readers.get_mut(&id) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                readers.remove(&id);
            }
            None => warn!("release_read without matching acquire_read"),
        }
    }
}

impl ClassIndex for InMemoryHost {
    fn find_class(&self, name: &ClassName, scope: &Scope) -> Option<ComponentClass> {
        let data = lock(&self.inner.data);
        let modules = data.scope_modules(scope);
        data.classes
            .iter()
            .find(|c| c.name == *name && modules.contains(&c.module))
            .cloned()
    }

    fn find_inheritors<'a>(
        &'a self,
        base: &ComponentClass,
        include_self: bool,
        scope: &Scope,
    ) -> Box<dyn Iterator<Item = ComponentClass> + 'a> {
        let data = lock(&self.inner.data);
        let modules = data.scope_modules(scope);
        let mut found = Vec::new();
        if include_self && modules.contains(&base.module) {
            found.push(base.clone());
        }

        // Walk through out-of-scope classes too: an in-scope class may extend
        // a library subclass of the base.
        let mut seen = HashSet::from([base.name.clone()]);
        let mut queue = VecDeque::from([base.name.clone()]);
        while let Some(parent_name) = queue.pop_front() {
            for class in data
                .classes
                .iter()
                .filter(|c| c.super_class.as_ref() == Some(&parent_name))
            {
                if !seen.insert(class.name.clone()) {
                    continue;
                }
                if modules.contains(&class.module) {
                    found.push(class.clone());
                }
                queue.push_back(class.name.clone());
            }
        }
        trace!("{} inheritors of {} in {scope:?}", found.len(), base.name);
        Box::new(found.into_iter())
    }
}

impl ReferenceResolver for InMemoryHost {
    fn resolve_reference(&self, from: &FileId, value: &str) -> Option<FileRef> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        let data = lock(&self.inner.data);
        let candidates: Vec<String> = match value.strip_prefix('/') {
            // Root-relative: against the source roots that contain `from`.
            Some(rooted) => data
                .modules
                .values()
                .flat_map(|m| m.source_roots.iter())
                .filter(|root| from.starts_with(&format!("{root}/")))
                .map(|root| join(root, rooted))
                .collect(),
            None => vec![join(parent(from), value)],
        };
        candidates
            .iter()
            .filter_map(|c| normalize(c))
            .find_map(|id| data.documents.get(&FileId::new(id)).map(|d| d.file.clone()))
    }
}

impl InjectionService for InMemoryHost {
    fn injection_host(&self, document: &Document, tag: &Element) -> Option<InjectionHost> {
        let host = InjectionHost {
            file: document.file.id.clone(),
            element: tag.id,
        };
        if lock(&self.inner.data).fragment_overrides.contains_key(&host) {
            return Some(host);
        }
        let has_body = tag.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        has_body.then_some(host)
    }

    fn injected_fragments(&self, host: &InjectionHost) -> Vec<InjectedFragment> {
        if let Some(overridden) = lock(&self.inner.data).fragment_overrides.get(host) {
            return overridden.clone();
        }
        self.fragment_for(host).into_iter().collect()
    }

    fn top_level_file(&self, document: &Document) -> FileRef {
        match document.file.id.split_once(FRAGMENT_SEPARATOR) {
            Some((hosting, _)) => FileRef::new(hosting),
            None => document.file.clone(),
        }
    }
}
