//! Lockfile model.
//!
//! The lockfile is the ownership baseline: every installed function name is
//! owned by exactly one package entry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Version reported for packages installed from a local archive
pub const LOCAL_VERSION: &str = "local";

/// Installed state of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLock {
    pub version: String,
    /// Origin tag: `registry:{name}/{version}` or `file:{path}`
    #[serde(default)]
    pub resolved: Option<String>,
    /// `sha256:<hex>` of the archive the functions came from
    #[serde(default)]
    pub integrity: Option<String>,
    /// Requirement strings declared by the installed version
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Function names owned by this package
    #[serde(default)]
    pub functions: Vec<String>,
}

impl PackageLock {
    /// Create an entry with no functions
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            resolved: None,
            integrity: None,
            dependencies: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Origin tag for a registry install
    pub fn registry_origin(name: &str, version: &str) -> String {
        format!("registry:{}/{}", name, version)
    }

    /// Origin tag for a local archive install
    pub fn file_origin(path: &str) -> String {
        format!("file:{}", path)
    }

    /// Check if this entry came from a local archive
    pub fn is_local(&self) -> bool {
        self.resolved
            .as_deref()
            .map_or(false, |r| r.starts_with("file:"))
    }

    /// Names of the packages this entry depends on
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| {
            let end = d
                .find(|c: char| !super::dependency::is_name_char(c))
                .unwrap_or(d.len());
            &d[..end]
        })
    }
}

/// Installed packages keyed by name, in install order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub packages: IndexMap<String, PackageLock>,
}

impl Lockfile {
    /// Create an empty lockfile
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a package is installed
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Entry for a package
    pub fn get(&self, name: &str) -> Option<&PackageLock> {
        self.packages.get(name)
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, name: impl Into<String>, entry: PackageLock) {
        self.packages.insert(name.into(), entry);
    }

    /// Remove an entry, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<PackageLock> {
        self.packages.shift_remove(name)
    }

    /// Function name to owning package name
    pub fn ownership_map(&self) -> HashMap<&str, &str> {
        self.packages
            .iter()
            .flat_map(|(pkg, entry)| entry.functions.iter().map(move |f| (f.as_str(), pkg.as_str())))
            .collect()
    }

    /// Every owned function name
    pub fn owned_functions(&self) -> impl Iterator<Item = &str> {
        self.packages
            .values()
            .flat_map(|entry| entry.functions.iter().map(String::as_str))
    }

    /// Function names claimed by more than one package
    pub fn shared_functions(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for name in self.owned_functions() {
            *seen.entry(name).or_default() += 1;
        }
        let mut shared: Vec<String> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect();
        shared.sort();
        shared
    }

    /// Check if this lockfile has no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(functions: &[&str]) -> PackageLock {
        PackageLock {
            functions: functions.iter().map(|f| f.to_string()).collect(),
            ..PackageLock::new("1.0.0")
        }
    }

    #[test]
    fn test_ownership_map() {
        let mut lock = Lockfile::new();
        lock.insert("stats", entry(&["MEAN", "MEDIAN"]));
        lock.insert("text", entry(&["SLUG"]));

        let owners = lock.ownership_map();
        assert_eq!(owners.get("MEAN"), Some(&"stats"));
        assert_eq!(owners.get("SLUG"), Some(&"text"));
        assert_eq!(owners.get("MEDIAN"), Some(&"stats"));
        assert_eq!(owners.get("NOPE"), None);
        assert!(lock.shared_functions().is_empty());
    }

    #[test]
    fn test_shared_functions_detected() {
        let mut lock = Lockfile::new();
        lock.insert("a", entry(&["F", "G"]));
        lock.insert("b", entry(&["G"]));
        assert_eq!(lock.shared_functions(), vec!["G".to_string()]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut lock = Lockfile::new();
        lock.insert("a", entry(&[]));
        lock.insert("b", entry(&[]));
        lock.insert("c", entry(&[]));
        lock.remove("b");
        let names: Vec<_> = lock.packages.keys().cloned().collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_dependency_names_strip_specifiers() {
        let mut e = entry(&[]);
        e.dependencies = vec!["pkg-a>=1.0,<2".to_string(), "pkg-b".to_string()];
        let names: Vec<_> = e.dependency_names().collect();
        assert_eq!(names, vec!["pkg-a", "pkg-b"]);
    }

    #[test]
    fn test_origin_tags() {
        assert_eq!(PackageLock::registry_origin("a", "1.0.0"), "registry:a/1.0.0");
        let mut e = PackageLock::new(LOCAL_VERSION);
        e.resolved = Some(PackageLock::file_origin("./a.gspkg"));
        assert!(e.is_local());
    }
}
