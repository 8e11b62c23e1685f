use crate::concurrency::{wait_for_consistency, ReadSnapshot};
use crate::diagnostics::{ProblemsHolder, CSS_COMPILE_FAILED};
use crate::extractor::StyleExtractor;
use crate::holder::LocalStyleHolder;
use crate::resolver::StyleResolver;
use crate::CoreError;
use localstyle_host::{ComponentClass, Host, HostError, StyleCompiler};
use localstyle_schema::{ClassName, CollectorConfig, ModuleName, SdkVersion};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Collects the local styles of one module.
///
/// Each call to [`collect`](Self::collect) is an independent pass: it waits
/// for a consistent source model, holds read access for its whole duration,
/// and owns a fresh identity cache.
pub struct ModuleStyleCollector<'h, H: Host + ?Sized> {
    host: &'h H,
    config: CollectorConfig,
}

impl<'h, H: Host + ?Sized> ModuleStyleCollector<'h, H> {
    pub fn new(host: &'h H, config: CollectorConfig) -> Self {
        Self { host, config }
    }

    pub fn with_defaults(host: &'h H) -> Self {
        Self::new(host, CollectorConfig::default())
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collect and compile the local styles of `module`.
    ///
    /// Returns `None` when the module has nothing to style: a library with
    /// no defaults stylesheet, or an application none of whose base types
    /// resolve, or a library whose defaults stylesheet fails to compile.
    /// Per-tag problems go to `problems`; the pass continues.
    pub fn collect(
        &self,
        module: &ModuleName,
        sdk_version: &str,
        compiler: &mut dyn StyleCompiler,
        problems: &mut ProblemsHolder,
    ) -> Result<Option<Vec<LocalStyleHolder>>, CoreError> {
        wait_for_consistency(self.host)?;

        let _snapshot = ReadSnapshot::acquire(self.host);
        let result = if self.host.is_application(module)? {
            info!("collecting local styles of application module {module}");
            let sdk = SdkVersion::parse(sdk_version)?;
            self.collect_application(module, &sdk, compiler, problems)?
        } else {
            info!("collecting local styles of library module {module}");
            self.collect_library(module, compiler, problems)?
        };
        match &result {
            Some(holders) => info!(
                "{module}: {} local style holders, {} problems",
                holders.len(),
                problems.len()
            ),
            None => info!("{module}: nothing to style"),
        }
        Ok(result)
    }

    fn collect_library(
        &self,
        module: &ModuleName,
        compiler: &mut dyn StyleCompiler,
        problems: &mut ProblemsHolder,
    ) -> Result<Option<Vec<LocalStyleHolder>>, CoreError> {
        let defaults_name = &self.config.library.defaults_stylesheet;
        let roots = self.host.source_roots(module)?;
        let Some(defaults) = roots
            .iter()
            .find_map(|root| self.host.find_child(root, defaults_name))
        else {
            debug!("{module}: no {defaults_name} in any source root");
            return Ok(None);
        };
        let Some(document) = self.host.document(&defaults.id) else {
            return Ok(None);
        };

        match compiler.compile(&document, module) {
            Ok(data) => Ok(Some(vec![LocalStyleHolder::defaults(defaults, data)])),
            Err(HostError::Compile { file, message }) => {
                warn!("{module}: defaults stylesheet {file} does not compile");
                problems.report(defaults.id, CSS_COMPILE_FAILED, &[file, message]);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_base_types(&self, module: &ModuleName, sdk: &SdkVersion) -> Vec<ComponentClass> {
        let scope = self.host.dependency_scope(module);
        self.config
            .base_types_for(sdk)
            .into_iter()
            .filter_map(|name| {
                let found = self.host.find_class(name, &scope);
                if found.is_none() {
                    debug!("{module}: base type {name} is not on the dependency path");
                }
                found
            })
            .collect()
    }

    fn collect_application(
        &self,
        module: &ModuleName,
        sdk: &SdkVersion,
        compiler: &mut dyn StyleCompiler,
        problems: &mut ProblemsHolder,
    ) -> Result<Option<Vec<LocalStyleHolder>>, CoreError> {
        let bases = self.resolve_base_types(module, sdk);
        if bases.is_empty() {
            debug!("{module}: no style-capable base type resolves for SDK {sdk}");
            return Ok(None);
        }

        let own_scope = self.host.own_scope(module);
        let extractor = StyleExtractor::new(&self.config.style);
        let mut resolver = StyleResolver::new(
            self.host,
            compiler,
            &self.config.style.source_attribute,
        );
        // A component reachable from two base types is processed once.
        let mut visited: HashSet<ClassName> = HashSet::new();
        for base in &bases {
            debug!("{module}: searching inheritors of {}", base.name);
            for class in self.host.find_inheritors(base, true, &own_scope) {
                if !visited.insert(class.name.clone()) {
                    continue;
                }
                extractor.process(&class, module, &mut resolver, problems)?;
            }
        }
        Ok(Some(resolver.into_holders()))
    }
}
