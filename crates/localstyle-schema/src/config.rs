use crate::sdk::SdkVersion;
use crate::types::ClassName;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_STYLE_NAMESPACE: &str = "http://ns.adobe.com/mxml/2009";
pub const DEFAULT_STYLE_TAG: &str = "Style";
pub const DEFAULT_SOURCE_ATTRIBUTE: &str = "source";
pub const DEFAULT_DEFAULTS_STYLESHEET: &str = "defaults.css";
pub const SPARK_APPLICATION: &str = "spark.components.Application";
pub const MX_APPLICATION: &str = "mx.core.Application";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("at least one base type must be configured")]
    NoBaseTypes,
}

/// Settings for one collection pass, loaded from `localstyle.toml`.
///
/// Every field has a default matching the standard framework, so an empty
/// file is a valid configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    #[serde(default)]
    pub style: StyleSection,
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default = "default_base_types")]
    pub base_types: Vec<BaseTypeSpec>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            style: StyleSection::default(),
            library: LibrarySection::default(),
            base_types: default_base_types(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StyleSection {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_source_attribute")]
    pub source_attribute: String,
}

impl Default for StyleSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            tag: default_tag(),
            source_attribute: default_source_attribute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LibrarySection {
    #[serde(default = "default_defaults_stylesheet")]
    pub defaults_stylesheet: String,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            defaults_stylesheet: default_defaults_stylesheet(),
        }
    }
}

/// A framework root class whose inheritors may declare style tags.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BaseTypeSpec {
    pub qualified_name: ClassName,
    #[serde(default)]
    pub min_sdk_major: Option<u32>,
}

impl BaseTypeSpec {
    pub fn new(qualified_name: &str, min_sdk_major: Option<u32>) -> Self {
        Self {
            qualified_name: ClassName::new(qualified_name),
            min_sdk_major,
        }
    }

    pub fn applies_to(&self, sdk: &SdkVersion) -> bool {
        self.min_sdk_major.is_none_or(|min| sdk.supports(min))
    }
}

impl CollectorConfig {
    /// Base types to search for the given SDK, in configuration order.
    pub fn base_types_for(&self, sdk: &SdkVersion) -> Vec<&ClassName> {
        self.base_types
            .iter()
            .filter(|b| b.applies_to(sdk))
            .map(|b| &b.qualified_name)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("style.namespace", &self.style.namespace),
            ("style.tag", &self.style.tag),
            ("style.source_attribute", &self.style.source_attribute),
            ("library.defaults_stylesheet", &self.library.defaults_stylesheet),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyField(field));
            }
        }
        if self.base_types.is_empty() {
            return Err(ConfigError::NoBaseTypes);
        }
        if self.base_types.iter().any(|b| b.qualified_name.is_empty()) {
            return Err(ConfigError::EmptyField("base_types.qualified_name"));
        }
        Ok(())
    }
}

fn default_namespace() -> String {
    DEFAULT_STYLE_NAMESPACE.to_owned()
}

fn default_tag() -> String {
    DEFAULT_STYLE_TAG.to_owned()
}

fn default_source_attribute() -> String {
    DEFAULT_SOURCE_ATTRIBUTE.to_owned()
}

fn default_defaults_stylesheet() -> String {
    DEFAULT_DEFAULTS_STYLESHEET.to_owned()
}

// Spark only exists from SDK 4 on; mx is always attempted.
fn default_base_types() -> Vec<BaseTypeSpec> {
    vec![
        BaseTypeSpec::new(SPARK_APPLICATION, Some(4)),
        BaseTypeSpec::new(MX_APPLICATION, None),
    ]
}

pub fn parse_config_str(input: &str) -> Result<CollectorConfig, ConfigError> {
    let config: CollectorConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<CollectorConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
