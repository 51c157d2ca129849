//! Registry answers as seen by the resolver
//!
//! A [`Provider`] turns an index into candidates. [`IndexProvider`] memoizes
//! version lists and dependency lists so each registry answer is computed at
//! most once per resolution.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::semver::VersionSelector;
use crate::ResolverResult;
use formulary_core::error::FormularyError;
use formulary_core::types::{Dependency, Package, Version, VersionReq};
use formulary_registry::PackageIndex;

/// A dependency with its specifier parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub dependency: Dependency,
    pub version_req: VersionReq,
}

impl Requirement {
    /// Parse the specifier of `dependency`
    pub fn new(dependency: Dependency) -> ResolverResult<Self> {
        let version_req = dependency
            .version_req()
            .map_err(|e| FormularyError::InvalidRequirement {
                input: dependency.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            dependency,
            version_req,
        })
    }

    /// Package name this requirement targets
    pub fn name(&self) -> &str {
        &self.dependency.name
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dependency)
    }
}

/// Candidate source for the backtracking resolver
pub trait Provider {
    /// Identifier a requirement constrains
    fn identify<'r>(&self, requirement: &'r Requirement) -> &'r str {
        requirement.name()
    }

    /// Candidates for `identifier` satisfying every requirement, best first
    fn find_matches(&self, identifier: &str, requirements: &[Requirement]) -> Vec<Package>;

    /// Check if `candidate` satisfies `requirement`
    fn is_satisfied_by(&self, requirement: &Requirement, candidate: &Package) -> bool {
        requirement.name() == candidate.name && candidate.version.satisfies(&requirement.version_req)
    }

    /// Requirements declared by `candidate`
    fn get_dependencies(&self, candidate: &Package) -> ResolverResult<Vec<Dependency>>;
}

/// Provider over any [`PackageIndex`]
pub struct IndexProvider<'i, I: PackageIndex + ?Sized> {
    index: &'i I,
    versions: DashMap<String, Arc<VersionSelector>>,
    dependencies: DashMap<(String, Version), Vec<String>>,
}

impl<'i, I: PackageIndex + ?Sized> IndexProvider<'i, I> {
    pub fn new(index: &'i I) -> Self {
        Self {
            index,
            versions: DashMap::new(),
            dependencies: DashMap::new(),
        }
    }

    /// Versions of `name`, read from the index once
    fn selector(&self, name: &str) -> Arc<VersionSelector> {
        if let Some(selector) = self.versions.get(name) {
            return Arc::clone(&selector);
        }
        let selector = Arc::new(VersionSelector::new(self.index.get_versions(name)));
        self.versions.insert(name.to_string(), Arc::clone(&selector));
        selector
    }

    /// Declared requirement strings of a candidate, fetched once
    pub fn dependency_strings(&self, candidate: &Package) -> ResolverResult<Vec<String>> {
        let key = (candidate.name.clone(), candidate.version.clone());
        if let Some(cached) = self.dependencies.get(&key) {
            return Ok(cached.clone());
        }

        let metadata = self
            .index
            .get_package_metadata(&candidate.name, &candidate.version)?;
        debug!(
            package = %candidate.name,
            version = %candidate.version,
            dependencies = metadata.dependencies.len(),
            "fetched candidate dependencies"
        );
        self.dependencies.insert(key, metadata.dependencies.clone());
        Ok(metadata.dependencies)
    }
}

impl<'i, I: PackageIndex + ?Sized> Provider for IndexProvider<'i, I> {
    fn find_matches(&self, identifier: &str, requirements: &[Requirement]) -> Vec<Package> {
        let constraints: Vec<VersionReq> = requirements
            .iter()
            .filter(|r| r.name() == identifier && !r.version_req.is_any())
            .map(|r| r.version_req.clone())
            .collect();

        self.selector(identifier)
            .candidates(&constraints)
            .into_iter()
            .map(|version| Package::new(identifier, version))
            .collect()
    }

    fn get_dependencies(&self, candidate: &Package) -> ResolverResult<Vec<Dependency>> {
        self.dependency_strings(candidate)?
            .iter()
            .map(|d| Dependency::parse(d))
            .collect()
    }
}
