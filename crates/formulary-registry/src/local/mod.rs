//! Registry backed by a directory on disk
//!
//! The directory has the same layout as a hosted registry: `index.json` at
//! the root and archives at the paths it lists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::api::RegistryIndex;
use crate::{legacy_archive_path, Registry, RegistryResult};
use formulary_core::error::FormularyError;
use formulary_core::utils::safe_join;

#[derive(Debug, Clone)]
pub struct LocalRegistry {
    root: PathBuf,
}

impl LocalRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_index(&self) -> RegistryResult<Arc<RegistryIndex>> {
        let path = self.root.join("index.json");
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| FormularyError::io(format!("Failed to read {}", path.display()), e))?;
        Ok(Arc::new(RegistryIndex::from_json(&data)?))
    }

    /// Read an archive relative to the root; `None` if absent
    async fn read_archive(&self, relative: &str) -> RegistryResult<Option<Vec<u8>>> {
        let path = safe_join(&self.root, Path::new(relative))?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FormularyError::io(format!("Failed to read {}", path.display()), e)),
        }
    }
}

impl Registry for LocalRegistry {
    async fn index(&self) -> RegistryResult<Arc<RegistryIndex>> {
        self.read_index().await
    }

    async fn refresh(&self) -> RegistryResult<Arc<RegistryIndex>> {
        self.read_index().await
    }

    async fn fetch_archive(&self, name: &str, version: &str) -> RegistryResult<Vec<u8>> {
        let legacy = legacy_archive_path(name, version);
        let index = self.read_index().await?;
        let primary = index
            .package(name)
            .and_then(|entry| entry.versions.get(version))
            .and_then(|meta| meta.path.clone())
            .unwrap_or_else(|| legacy.clone());

        let mut data = self.read_archive(&primary).await?;
        if data.is_none() && primary != legacy {
            data = self.read_archive(&legacy).await?;
        }
        let data = data.ok_or_else(|| FormularyError::VersionNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })?;

        debug!(package = name, version, root = %self.root.display(), "read archive from local registry");
        Ok(data)
    }
}
