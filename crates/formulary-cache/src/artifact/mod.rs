//! Artifact cache
//!
//! Archives live at `{root}/{name}/{version}.gspkg`. Entries are only ever
//! added, and each one is written to a temporary file in the same directory
//! and renamed into place, so concurrent readers never see a partial archive.

use camino::{Utf8Path, Utf8PathBuf};
use formulary_core::error::FormularyError;
use std::fs;
use std::io::Write;
use tracing::debug;

use crate::CacheResult;

/// File extension of package archives
pub const ARTIFACT_EXTENSION: &str = "gspkg";

/// Cache of downloaded package archives
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    /// Root directory (~/.formulary/cache)
    root: Utf8PathBuf,
}

/// Summary of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactStats {
    /// Package directories
    pub packages: usize,
    /// Archives across all packages
    pub artifacts: usize,
    /// Total archive size in bytes
    pub total_bytes: u64,
}

/// A name or version must be a single plain path component
fn check_component(value: &str) -> CacheResult<()> {
    let plain = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(|c: char| c == '/' || c == '\\' || c == '\0');
    if plain {
        Ok(())
    } else {
        Err(FormularyError::UnsafePath {
            path: value.to_string(),
        })
    }
}

impl ArtifactCache {
    /// Open the cache, creating the root directory if needed
    pub fn new(root: impl Into<Utf8PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| FormularyError::io(format!("Failed to create cache directory {}", root), e))?;
        Ok(Self { root })
    }

    /// Root directory of the cache
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Where the archive for `name` at `version` lives
    pub fn artifact_path(&self, name: &str, version: &str) -> CacheResult<Utf8PathBuf> {
        check_component(name)?;
        check_component(version)?;
        Ok(self
            .root
            .join(name)
            .join(format!("{}.{}", version, ARTIFACT_EXTENSION)))
    }

    /// Check if the archive is cached
    pub fn has_artifact(&self, name: &str, version: &str) -> bool {
        self.artifact_path(name, version)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Store archive bytes; an existing entry is kept as is
    pub fn store(&self, name: &str, version: &str, data: &[u8]) -> CacheResult<Utf8PathBuf> {
        let path = self.artifact_path(name, version)?;
        if path.is_file() {
            debug!(package = name, version, "artifact already cached");
            return Ok(path);
        }

        let dir = self.root.join(name);
        fs::create_dir_all(&dir)
            .map_err(|e| FormularyError::io(format!("Failed to create {}", dir), e))?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| FormularyError::io(format!("Failed to create temp file in {}", dir), e))?;
        temp.write_all(data)
            .map_err(|e| FormularyError::io("Failed to write artifact".to_string(), e))?;
        temp.persist(&path)
            .map_err(|e| FormularyError::io(format!("Failed to move artifact to {}", path), e.error))?;

        debug!(package = name, version, bytes = data.len(), "cached artifact");
        Ok(path)
    }

    /// Delete every cached archive
    pub fn clear(&self) -> CacheResult<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|e| FormularyError::io(format!("Failed to remove {}", self.root), e))?;
        }
        fs::create_dir_all(&self.root)
            .map_err(|e| FormularyError::io(format!("Failed to recreate {}", self.root), e))
    }

    /// Count packages, archives and bytes
    pub fn stats(&self) -> CacheResult<ArtifactStats> {
        let mut stats = ArtifactStats::default();
        let read_dir = |dir: &Utf8Path| {
            fs::read_dir(dir).map_err(|e| FormularyError::io(format!("Failed to list {}", dir), e))
        };

        for package in read_dir(&self.root)? {
            let package = package.map_err(|e| FormularyError::io("Failed to list cache".to_string(), e))?;
            if !package.path().is_dir() {
                continue;
            }
            stats.packages += 1;

            for artifact in fs::read_dir(package.path())
                .map_err(|e| FormularyError::io("Failed to list package directory".to_string(), e))?
            {
                let artifact =
                    artifact.map_err(|e| FormularyError::io("Failed to list package directory".to_string(), e))?;
                let path = artifact.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                    continue;
                }
                let metadata = artifact
                    .metadata()
                    .map_err(|e| FormularyError::io(format!("Failed to stat {}", path.display()), e))?;
                stats.artifacts += 1;
                stats.total_bytes += metadata.len();
            }
        }

        Ok(stats)
    }
}
