use crate::cache::{HolderId, IdentityCache, Lookup};
use crate::diagnostics::{
    ElementLocation, InvalidProperty, CSS_COMPILE_FAILED, EMBED_SOURCE_IS_NOT_CSS_FILE,
    EMBED_SOURCE_NOT_FOUND,
};
use crate::holder::LocalStyleHolder;
use crate::CoreError;
use localstyle_host::{Document, Element, Host, HostError, InjectionHost, StyleCompiler};
use localstyle_schema::ModuleName;
use tracing::debug;

/// How a style tag attaches its stylesheet, decided once per tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleAttachment<'t> {
    /// `source="..."` naming a separate stylesheet file.
    AttributeReference(&'t str),
    /// Stylesheet text injected into the tag body.
    Injected(InjectionHost),
    /// Nothing to attach.
    None,
}

/// Resolves style tags to compiled holders for one collection pass.
///
/// Owns the pass-scoped [`IdentityCache`]; external stylesheets are compiled
/// only on a cache miss.
pub struct StyleResolver<'a, H: Host + ?Sized> {
    host: &'a H,
    compiler: &'a mut dyn StyleCompiler,
    source_attribute: &'a str,
    cache: IdentityCache,
}

impl<'a, H: Host + ?Sized> StyleResolver<'a, H> {
    pub fn new(host: &'a H, compiler: &'a mut dyn StyleCompiler, source_attribute: &'a str) -> Self {
        Self {
            host,
            compiler,
            source_attribute,
            cache: IdentityCache::new(),
        }
    }

    pub fn host(&self) -> &'a H {
        self.host
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn classify<'t>(&self, document: &Document, tag: &'t Element) -> StyleAttachment<'t> {
        match tag.attribute(self.source_attribute) {
            Some(Some(value)) => StyleAttachment::AttributeReference(value),
            // Present without a value: neither a reference nor injected content.
            Some(None) => StyleAttachment::None,
            None => self
                .host
                .injection_host(document, tag)
                .map_or(StyleAttachment::None, StyleAttachment::Injected),
        }
    }

    /// Resolve one style tag found in `document`.
    ///
    /// Returns the holder emitted for this tag, or `None` when the tag has
    /// nothing to attach or references a stylesheet another tag already
    /// emitted (the owning document is then recorded as an extra user).
    /// A stylesheet that fails to compile is reported as an invalid property
    /// of the tag.
    pub fn resolve(
        &mut self,
        tag: &Element,
        document: &Document,
        module: &ModuleName,
    ) -> Result<Option<HolderId>, CoreError> {
        let location = ElementLocation {
            file: document.file.id.clone(),
            element: tag.id,
            line: tag.line,
        };
        match self.classify(document, tag) {
            StyleAttachment::AttributeReference(value) => {
                self.resolve_reference(document, module, value, location)
            }
            StyleAttachment::Injected(host) => self.resolve_injected(&host, module, &location),
            StyleAttachment::None => Ok(None),
        }
    }

    pub fn into_holders(self) -> Vec<LocalStyleHolder> {
        self.cache.into_holders()
    }

    fn resolve_reference(
        &mut self,
        document: &Document,
        module: &ModuleName,
        value: &str,
        location: ElementLocation,
    ) -> Result<Option<HolderId>, CoreError> {
        let Some(target) = self.host.resolve_reference(&document.file.id, value) else {
            return Err(
                InvalidProperty::new(location, EMBED_SOURCE_NOT_FOUND, vec![value.to_owned()])
                    .into(),
            );
        };
        let Some(stylesheet) = self
            .host
            .document(&target.id)
            .filter(|d| d.is_stylesheet())
        else {
            return Err(InvalidProperty::new(
                location,
                EMBED_SOURCE_IS_NOT_CSS_FILE,
                vec![target.name],
            )
            .into());
        };

        let user = document.file.id.clone();
        let compiler = &mut *self.compiler;
        let lookup = self.cache.lookup_or_create(&target.id, || {
            let data = compile_or_report(compiler, &stylesheet, module, &location)?;
            Ok::<_, CoreError>(LocalStyleHolder::external(
                stylesheet.file.clone(),
                data,
                user.clone(),
            ))
        })?;
        match lookup {
            Lookup::Created(id) => {
                debug!("compiled external stylesheet {} for {user}", target.id);
                Ok(Some(id))
            }
            Lookup::Existing(id) => {
                debug!("{} already compiled; adding user {user}", target.id);
                self.cache.add_user(id, user);
                Ok(None)
            }
        }
    }

    fn resolve_injected(
        &mut self,
        host: &InjectionHost,
        module: &ModuleName,
        location: &ElementLocation,
    ) -> Result<Option<HolderId>, CoreError> {
        let fragments = self.host.injected_fragments(host);
        let fragment = match fragments.as_slice() {
            [] => return Ok(None),
            [fragment] => fragment,
            more => {
                return Err(CoreError::InjectionInvariant(format!(
                    "{} fragments injected into element {} of {}, expected one",
                    more.len(),
                    host.element,
                    host.file
                )))
            }
        };
        match fragment.shreds.as_slice() {
            [shred] if shred.host == *host => {}
            shreds => {
                return Err(CoreError::InjectionInvariant(format!(
                    "fragment {} has {} shreds not all hosted by element {} of {}",
                    fragment.document.file,
                    shreds.len(),
                    host.element,
                    host.file
                )))
            }
        }
        if !fragment.document.is_stylesheet() {
            return Ok(None);
        }

        let file = self.host.top_level_file(&fragment.document);
        let data = compile_or_report(&mut *self.compiler, &fragment.document, module, location)?;
        debug!("compiled inline stylesheet hosted by {file}");
        Ok(Some(
            self.cache.push_inline(LocalStyleHolder::inline(file, data)),
        ))
    }
}

fn compile_or_report(
    compiler: &mut dyn StyleCompiler,
    stylesheet: &Document,
    module: &ModuleName,
    location: &ElementLocation,
) -> Result<Vec<u8>, CoreError> {
    compiler.compile(stylesheet, module).map_err(|e| match e {
        HostError::Compile { file, message } => {
            InvalidProperty::new(location.clone(), CSS_COMPILE_FAILED, vec![file, message]).into()
        }
        other => other.into(),
    })
}
