//! Dependency requirement types.
//!
//! A requirement string is a package name (`[A-Za-z0-9_-]+`) followed by an
//! optional specifier kept verbatim, e.g. `stats>=1.0.0,<2.0.0`. Local
//! dependencies use the `name@file:<path>` form and never reach the resolver.

use super::{VersionError, VersionReq};
use crate::error::{FormularyError, FormularyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker that separates a local dependency name from its path
const LOCAL_MARKER: &str = "@file:";

/// Dependency on a named package
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Version range expression; empty matches any version
    #[serde(default)]
    pub specifier: String,
}

impl Dependency {
    /// Create a new dependency
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: specifier.into(),
        }
    }

    /// Create a dependency on a package archive at a local path
    pub fn local(name: impl Into<String>, path: &str) -> Self {
        Self::new(name, format!("{}{}", LOCAL_MARKER, path))
    }

    /// Parse a requirement string such as `pkg-a>=1.0` or `pkg-a@file:./x.gspkg`
    pub fn parse(requirement: &str) -> FormularyResult<Self> {
        let requirement = requirement.trim();
        let name_len = requirement
            .char_indices()
            .find(|(_, c)| !is_name_char(*c))
            .map(|(i, _)| i)
            .unwrap_or(requirement.len());

        if name_len == 0 {
            return Err(FormularyError::InvalidRequirement {
                input: requirement.to_string(),
                reason: "requirement must start with a package name".to_string(),
            });
        }

        let (name, specifier) = requirement.split_at(name_len);
        Ok(Self::new(name, specifier.trim()))
    }

    /// Path of a local dependency, if this is one
    pub fn local_path(&self) -> Option<&str> {
        self.specifier.strip_prefix(LOCAL_MARKER)
    }

    /// Check if this dependency bypasses the registry
    pub fn is_local(&self) -> bool {
        self.local_path().is_some()
    }

    /// Parse the specifier as a version requirement
    pub fn version_req(&self) -> Result<VersionReq, VersionError> {
        VersionReq::parse(&self.specifier)
    }
}

/// Characters allowed in a package name
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.specifier)
    }
}
