//! Identifiers shared by the host model and the collector.
//!
//! They serialize as plain strings, so fixtures and JSON output read the same
//! as the paths and names they carry.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::convert::Infallible;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Declares string-backed identifiers. Each one borrows as `str`, so maps
/// keyed by it can be queried with a plain `&str`, and compares equal to the
/// string types listed after `==`.
macro_rules! identifiers {
    ($( $(#[$doc:meta])* $name:ident == [$($other:ty),*]; )+) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                self.as_str()
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self.as_str(), f)
            }
        }

        impl FromStr for $name {
            type Err = Infallible;
            fn from_str(s: &str) -> Result<Self, Infallible> {
                Ok(Self::new(s))
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }

        $(
            impl PartialEq<$other> for $name {
                fn eq(&self, other: &$other) -> bool {
                    AsRef::<str>::as_ref(other) == self.as_str()
                }
            }
        )*
    )+};
}

identifiers! {
    /// Canonical identity of a file in the host's source tree.
    ///
    /// Two references that resolve to the same underlying file always carry
    /// equal `FileId`s, whatever their textual spelling was.
    FileId == [str, &str, String];

    /// Fully qualified class name, e.g. `mx.core.Application`.
    ClassName == [str, &str, String];

    /// Name of a build module.
    ModuleName == [str, &str, String];
}

impl FileId {
    /// Last path segment, used for display and diagnostics.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl ClassName {
    /// Unqualified part of the class name.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}
