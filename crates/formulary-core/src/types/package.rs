//! Package types.
//!
//! `Package` is a resolution candidate: one concrete version of a named
//! package. `ProjectMetadata` is the manifest of the workbook being managed
//! (and of every published archive).

use super::{Dependency, Version};
use crate::error::FormularyResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One candidate version of a package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,
    /// Requirement strings declared by this version
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Package {
    /// Create a candidate without known dependencies
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: Vec::new(),
        }
    }

    /// Attach the declared requirement strings
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Parse the declared requirement strings
    pub fn parsed_dependencies(&self) -> FormularyResult<Vec<Dependency>> {
        self.dependencies
            .iter()
            .map(|d| Dependency::parse(d))
            .collect()
    }

    /// Check if this is a valid package name
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.chars().all(super::dependency::is_name_char)
            && !name.starts_with('-')
            && !name.ends_with('-')
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Package {}

impl PartialOrd for Package {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Package {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.version.cmp(&other.version))
    }
}

/// Project manifest stored in the workbook and in `__GSPROJECT__.json`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Requirement strings, registry or `name@file:<path>`
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Any other keys (author, license, homepage...)
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ProjectMetadata {
    /// Create metadata for a new project
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Parse every dependency entry
    pub fn parsed_dependencies(&self) -> FormularyResult<Vec<Dependency>> {
        self.dependencies
            .iter()
            .map(|d| Dependency::parse(d))
            .collect()
    }

    /// Replace the entry for `dep.name`, or append it
    pub fn upsert_dependency(&mut self, dep: &Dependency) {
        let entry = dep.to_string();
        let existing = self
            .dependencies
            .iter()
            .position(|d| Dependency::parse(d).map_or(false, |p| p.name == dep.name));
        match existing {
            Some(index) => self.dependencies[index] = entry,
            None => self.dependencies.push(entry),
        }
    }

    /// Drop the entry for `name`; returns whether one was present
    pub fn remove_dependency(&mut self, name: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies
            .retain(|d| Dependency::parse(d).map_or(true, |p| p.name != name));
        before != self.dependencies.len()
    }

    /// Look up a string field from `extra`
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}
