use crate::SchemaError;
use serde::Serialize;
use std::fmt;

/// Target SDK version, as reported by the active build configuration.
///
/// Only the major component matters for base-type selection; the rest of the
/// string is kept verbatim for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdkVersion {
    pub major: u32,
    pub raw: String,
}

impl SdkVersion {
    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let trimmed = input.trim();
        let digits: &str = {
            let end = trimmed
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(trimmed.len());
            &trimmed[..end]
        };
        if digits.is_empty() {
            return Err(SchemaError::InvalidSdkVersion(input.to_owned()));
        }
        let major = digits
            .parse()
            .map_err(|_| SchemaError::InvalidSdkVersion(input.to_owned()))?;
        Ok(Self {
            major,
            raw: trimmed.to_owned(),
        })
    }

    /// Whether this SDK is at least the given major version.
    pub fn supports(&self, min_major: u32) -> bool {
        self.major >= min_major
    }
}

impl fmt::Display for SdkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for SdkVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
