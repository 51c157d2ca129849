//! Candidate version ordering
//!
//! Candidates are offered newest first. Prerelease versions only appear when
//! no stable version satisfies the constraints.

use std::collections::BTreeSet;

use formulary_core::types::{Version, VersionReq};

/// Version selector for finding best matching versions
#[derive(Debug, Clone, Default)]
pub struct VersionSelector {
    /// Available versions in ascending order
    available_versions: BTreeSet<Version>,
}

impl VersionSelector {
    /// Create new version selector with available versions
    pub fn new(versions: impl IntoIterator<Item = Version>) -> Self {
        Self {
            available_versions: versions.into_iter().collect(),
        }
    }

    /// Every version matching all constraints, highest first
    pub fn matching_descending(&self, constraints: &[VersionReq]) -> Vec<Version> {
        self.available_versions
            .iter()
            .rev()
            .filter(|version| constraints.iter().all(|req| req.matches(version)))
            .cloned()
            .collect()
    }

    /// Candidates in preference order: stable matches, else prerelease matches
    pub fn candidates(&self, constraints: &[VersionReq]) -> Vec<Version> {
        let matching = self.matching_descending(constraints);
        if matching.iter().any(|v| !v.is_prerelease()) {
            matching.into_iter().filter(|v| !v.is_prerelease()).collect()
        } else {
            matching
        }
    }

    /// Number of distinct versions
    pub fn len(&self) -> usize {
        self.available_versions.len()
    }

    /// Check if no versions are available
    pub fn is_empty(&self) -> bool {
        self.available_versions.is_empty()
    }
}
