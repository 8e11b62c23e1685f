//! JSON project descriptions loaded into an [`InMemoryHost`].
//!
//! ```json
//! {
//!   "modules": [{ "name": "app", "nature": "application", "source_roots": ["app/src"] }],
//!   "documents": [{ "path": "app/src/shared.css", "kind": "stylesheet", "text": "A { b: c; }" }],
//!   "classes": [{ "name": "Main", "module": "app", "extends": "mx.core.Application",
//!                 "file": "app/src/Main.mxml" }]
//! }
//! ```

use crate::memory::InMemoryHost;
use crate::model::{ComponentClass, Document, DocumentKind, Element, FileRef, ModuleNature};
use crate::HostError;
use localstyle_schema::{FileId, ModuleName};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub modules: Vec<ModuleFixture>,
    #[serde(default)]
    pub documents: Vec<DocumentFixture>,
    #[serde(default)]
    pub classes: Vec<ComponentClass>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleFixture {
    pub name: ModuleName,
    pub nature: ModuleNature,
    #[serde(default)]
    pub source_roots: Vec<FileId>,
    #[serde(default)]
    pub dependencies: Vec<ModuleName>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentFixture {
    pub path: FileId,
    pub kind: DocumentKind,
    #[serde(default)]
    pub root: Option<Element>,
    #[serde(default)]
    pub text: String,
}

impl Fixture {
    pub fn parse_str(input: &str) -> Result<Self, HostError> {
        let fixture: Self = serde_json::from_str(input)?;
        fixture.validate()?;
        Ok(fixture)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    fn validate(&self) -> Result<(), HostError> {
        let mut modules = HashSet::new();
        for module in &self.modules {
            if !modules.insert(&module.name) {
                return Err(HostError::Fixture(format!(
                    "duplicate module '{}'",
                    module.name
                )));
            }
        }
        for module in &self.modules {
            if let Some(missing) = module.dependencies.iter().find(|d| !modules.contains(d)) {
                return Err(HostError::Fixture(format!(
                    "module '{}' depends on unknown module '{missing}'",
                    module.name
                )));
            }
        }

        let mut paths = HashSet::new();
        for doc in &self.documents {
            if !paths.insert(&doc.path) {
                return Err(HostError::Fixture(format!(
                    "duplicate document '{}'",
                    doc.path
                )));
            }
            if doc.root.is_some() && doc.kind != DocumentKind::Markup {
                return Err(HostError::Fixture(format!(
                    "document '{}' has an element tree but is not markup",
                    doc.path
                )));
            }
        }

        for class in &self.classes {
            if !modules.contains(&class.module) {
                return Err(HostError::Fixture(format!(
                    "class '{}' belongs to unknown module '{}'",
                    class.name, class.module
                )));
            }
            if let Some(file) = &class.file {
                if !paths.contains(file) {
                    return Err(HostError::Fixture(format!(
                        "class '{}' points at unknown document '{file}'",
                        class.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn into_host(self) -> InMemoryHost {
        let host = InMemoryHost::new();
        debug!(
            "loading fixture: {} modules, {} documents, {} classes",
            self.modules.len(),
            self.documents.len(),
            self.classes.len()
        );
        for module in self.modules {
            let roots: Vec<&str> = module.source_roots.iter().map(FileId::as_str).collect();
            let deps: Vec<&str> = module.dependencies.iter().map(ModuleName::as_str).collect();
            host.add_module(&module.name, module.nature, &roots, &deps);
        }
        for doc in self.documents {
            let file = FileRef::new(doc.path);
            let document = match doc.kind {
                DocumentKind::Markup => Document::markup(file, doc.root),
                DocumentKind::Stylesheet => Document::stylesheet(file, &doc.text),
                DocumentKind::Other => Document::other(file, &doc.text),
            };
            host.add_document(document);
        }
        for class in self.classes {
            host.add_class(class);
        }
        host
    }
}
