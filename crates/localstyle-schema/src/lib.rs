//! Identifiers, SDK version handling, and collector configuration for localstyle.
//!
//! This crate defines the schema layer: string newtypes for canonical file
//! identities and qualified class names, `SdkVersion` parsing, and the TOML
//! `CollectorConfig` that names the style namespace, the reserved tag and
//! attribute names, the library defaults stylesheet, and the ordered list of
//! style-capable base types.

pub mod config;
pub mod sdk;
pub mod types;

pub use config::{
    parse_config_file, parse_config_str, BaseTypeSpec, CollectorConfig, ConfigError,
    LibrarySection, StyleSection, MX_APPLICATION, SPARK_APPLICATION,
};
pub use sdk::SdkVersion;
pub use types::{ClassName, FileId, ModuleName};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid SDK version: '{0}'")]
    InvalidSdkVersion(String),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
