//! Neutral source model shared between the host and the collector.
//!
//! Documents are immutable snapshots; the host hands them out behind `Arc`
//! so the collector can hold them while walking elements.

use localstyle_schema::{ClassName, FileId, ModuleName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleNature {
    Application,
    Library,
}

impl fmt::Display for ModuleNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => f.write_str("application"),
            Self::Library => f.write_str("library"),
        }
    }
}

/// Search scope for class lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Only classes declared in the module itself.
    ModuleOnly(ModuleName),
    /// The module plus everything on its dependency and library path.
    ModuleWithDependencies(ModuleName),
}

impl Scope {
    pub fn module(&self) -> &ModuleName {
        match self {
            Self::ModuleOnly(m) | Self::ModuleWithDependencies(m) => m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub id: FileId,
    pub name: String,
}

impl FileRef {
    pub fn new(id: impl Into<FileId>) -> Self {
        let id = id.into();
        let name = id.file_name().to_owned();
        Self { id, name }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Markup,
    Stylesheet,
    Other,
}

/// Pre-order index of an element inside its document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(skip)]
    pub id: ElementId,
    #[serde(rename = "ns", default)]
    pub namespace: String,
    #[serde(rename = "name")]
    pub local_name: String,
    /// Attribute name to value; `None` for an attribute written without a value.
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default)]
    pub text: Option<String>,
    /// Language of the body text when it is injected content.
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
}

impl Element {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self {
            id: ElementId::default(),
            namespace: namespace.to_owned(),
            local_name: local_name.to_owned(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            language: None,
            line: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: Option<&str>) -> Self {
        self.attributes
            .insert(name.to_owned(), value.map(str::to_owned));
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_owned());
        self
    }

    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// `None` when absent, `Some(None)` when present without a value.
    pub fn attribute(&self, name: &str) -> Option<Option<&str>> {
        self.attributes.get(name).map(Option::as_deref)
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace == namespace && self.local_name == local_name
    }

    fn assign_ids(&mut self, next: &mut u32) {
        self.id = ElementId(*next);
        *next += 1;
        for child in &mut self.children {
            child.assign_ids(next);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file: FileRef,
    pub kind: DocumentKind,
    pub root: Option<Element>,
    pub text: String,
}

impl Document {
    /// Markup document; element ids are assigned in pre-order from 0.
    pub fn markup(file: FileRef, root: Option<Element>) -> Self {
        let root = root.map(|mut r| {
            let mut next = 0;
            r.assign_ids(&mut next);
            r
        });
        Self {
            file,
            kind: DocumentKind::Markup,
            root,
            text: String::new(),
        }
    }

    pub fn stylesheet(file: FileRef, text: &str) -> Self {
        Self {
            file,
            kind: DocumentKind::Stylesheet,
            root: None,
            text: text.to_owned(),
        }
    }

    pub fn other(file: FileRef, text: &str) -> Self {
        Self {
            file,
            kind: DocumentKind::Other,
            root: None,
            text: text.to_owned(),
        }
    }

    pub fn is_stylesheet(&self) -> bool {
        self.kind == DocumentKind::Stylesheet
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentClass {
    pub name: ClassName,
    pub module: ModuleName,
    #[serde(default, rename = "extends")]
    pub super_class: Option<ClassName>,
    /// File the class navigates to; `None` for compiled library classes.
    #[serde(default)]
    pub file: Option<FileId>,
}

/// Element that hosts injected content inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectionHost {
    pub file: FileId,
    pub element: ElementId,
}

/// Part of a host's text that contributes to an injected fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shred {
    pub host: InjectionHost,
    pub range: std::ops::Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedFragment {
    pub document: std::sync::Arc<Document>,
    pub shreds: Vec<Shred>,
}
