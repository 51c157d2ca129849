//! Registry index types
//!
//! `index.json` maps each package name to its description and published
//! versions: `{pkg: {description, author, license, homepage, versions:
//! {ver: {dependencies, path, description}}}}`.

use crate::RegistryResult;
use formulary_core::{FormularyError, Version};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Parsed `index.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryIndex {
    pub packages: IndexMap<String, PackageEntry>,
}

/// One package in the index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    /// Published versions keyed by version string
    #[serde(default)]
    pub versions: IndexMap<String, VersionMetadata>,
}

/// Metadata for one published version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Requirement strings
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Archive path relative to the registry base
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Read access to package versions and their metadata
pub trait PackageIndex {
    /// Every parseable version published for `name`; empty for unknown packages
    fn get_versions(&self, name: &str) -> Vec<Version>;

    /// Metadata for one version
    fn get_package_metadata(&self, name: &str, version: &Version) -> RegistryResult<VersionMetadata>;
}

impl RegistryIndex {
    /// Parse index JSON
    pub fn from_json(data: &[u8]) -> RegistryResult<Self> {
        serde_json::from_slice(data).map_err(|e| FormularyError::json("registry index", e))
    }

    /// Entry for a package
    pub fn package(&self, name: &str) -> Option<&PackageEntry> {
        self.packages.get(name)
    }

    /// The index key for `version`, tolerating short forms like `1.0`
    pub fn version_key(&self, name: &str, version: &Version) -> Option<&str> {
        let entry = self.package(name)?;
        let exact = version.to_string();
        if let Some((key, _)) = entry.versions.get_key_value(&exact) {
            return Some(key.as_str());
        }
        entry
            .versions
            .keys()
            .find(|key| key.parse::<Version>().map_or(false, |v| &v == version))
            .map(String::as_str)
    }

    /// Highest stable version, or highest prerelease when nothing is stable
    pub fn latest_version(&self, name: &str) -> Option<Version> {
        let versions = self.get_versions(name);
        let stable = versions.iter().filter(|v| !v.is_prerelease()).max().cloned();
        stable.or_else(|| versions.into_iter().max())
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Check if the index lists no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageIndex for RegistryIndex {
    fn get_versions(&self, name: &str) -> Vec<Version> {
        let Some(entry) = self.package(name) else {
            return Vec::new();
        };
        entry
            .versions
            .keys()
            .filter_map(|key| match key.parse::<Version>() {
                Ok(version) => Some(version),
                Err(e) => {
                    warn!(package = name, version = %key, error = %e, "skipping unparseable version");
                    None
                },
            })
            .collect()
    }

    fn get_package_metadata(&self, name: &str, version: &Version) -> RegistryResult<VersionMetadata> {
        let entry = self
            .package(name)
            .ok_or_else(|| FormularyError::PackageNotFound {
                name: name.to_string(),
            })?;
        let key = self
            .version_key(name, version)
            .ok_or_else(|| FormularyError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })?;
        Ok(entry.versions[key].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RegistryIndex {
        RegistryIndex::from_json(
            br#"{
                "stats": {
                    "description": "Statistics helpers",
                    "author": "ada",
                    "versions": {
                        "1.0.0": {"dependencies": [], "path": "packages/stats/1.0.0/stats@1.0.0.gspkg"},
                        "1.1": {"dependencies": ["text>=1.0"], "description": "short key"},
                        "2.0.0-beta.1": {},
                        "garbage": {}
                    }
                },
                "text": {"versions": {"1.0.0": {}}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_get_versions_skips_unparseable() {
        let index = sample();
        let mut versions = index.get_versions("stats");
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["1.0.0", "1.1.0", "2.0.0-beta.1"]);
        assert!(index.get_versions("missing").is_empty());
    }

    #[test]
    fn test_metadata_by_normalized_version() {
        let index = sample();
        let meta = index
            .get_package_metadata("stats", &Version::new(1, 1, 0))
            .unwrap();
        assert_eq!(meta.dependencies, vec!["text>=1.0"]);
        assert_eq!(index.version_key("stats", &Version::new(1, 1, 0)), Some("1.1"));
    }

    #[test]
    fn test_metadata_errors() {
        let index = sample();
        assert!(matches!(
            index.get_package_metadata("missing", &Version::new(1, 0, 0)),
            Err(FormularyError::PackageNotFound { .. })
        ));
        assert!(matches!(
            index.get_package_metadata("stats", &Version::new(9, 0, 0)),
            Err(FormularyError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_latest_prefers_stable() {
        let index = sample();
        assert_eq!(index.latest_version("stats"), Some(Version::new(1, 1, 0)));
        assert_eq!(index.package("stats").unwrap().author.as_deref(), Some("ada"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RegistryIndex::from_json(b"[1, 2"),
            Err(FormularyError::JsonParse { .. })
        ));
    }
}
