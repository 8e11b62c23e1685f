use crate::diagnostics::ProblemsHolder;
use crate::resolver::StyleResolver;
use crate::CoreError;
use localstyle_host::{ComponentClass, Document, DocumentKind, Element, Host, ProjectModel};
use localstyle_schema::{ModuleName, StyleSection};
use std::sync::Arc;
use tracing::trace;

/// Finds the style tags declared directly under a component's root element.
pub struct StyleExtractor<'c> {
    namespace: &'c str,
    tag: &'c str,
}

impl<'c> StyleExtractor<'c> {
    pub fn new(style: &'c StyleSection) -> Self {
        Self {
            namespace: &style.namespace,
            tag: &style.tag,
        }
    }

    /// The markup document backing `class`, if it has anything under its root.
    pub fn backing_document<H: ProjectModel + ?Sized>(
        &self,
        host: &H,
        class: &ComponentClass,
    ) -> Option<Arc<Document>> {
        let document = host.document(class.file.as_ref()?)?;
        if document.kind != DocumentKind::Markup {
            return None;
        }
        let has_children = document
            .root
            .as_ref()
            .is_some_and(|root| !root.children.is_empty());
        has_children.then_some(document)
    }

    pub fn style_tags<'d>(&self, document: &'d Document) -> impl Iterator<Item = &'d Element> + 'd {
        let (namespace, tag) = (self.namespace.to_owned(), self.tag.to_owned());
        document
            .root
            .iter()
            .flat_map(|root| root.children.iter())
            .filter(move |child| child.is(&namespace, &tag))
    }

    /// Resolve every style tag of `class`, recording per-tag problems.
    ///
    /// Returns the number of holders emitted. Invalid attachments and
    /// stylesheets that fail to compile are added to `problems` and do not
    /// stop the remaining tags; any other error aborts.
    pub fn process<H: Host + ?Sized>(
        &self,
        class: &ComponentClass,
        module: &ModuleName,
        resolver: &mut StyleResolver<'_, H>,
        problems: &mut ProblemsHolder,
    ) -> Result<usize, CoreError> {
        let Some(document) = self.backing_document(resolver.host(), class) else {
            trace!("{} has no markup document with content", class.name);
            return Ok(0);
        };

        let mut problems = problems.enter_file(document.file.id.clone());
        let mut emitted = 0;
        for tag in self.style_tags(&document) {
            match resolver.resolve(tag, &document, module) {
                Ok(Some(_)) => emitted += 1,
                Ok(None) => {}
                Err(CoreError::InvalidProperty(problem)) => problems.add(problem),
                Err(e) => return Err(e),
            }
        }
        trace!("{}: {emitted} holders", class.name);
        Ok(emitted)
    }
}
