//! Package registry access for Formulary
//!
//! This crate provides the registry capability used by the resolver and the
//! installer: a registry index (`index.json`) listing every package version
//! with its dependencies and archive path, plus archive downloads.
//!
//! Two backends implement [`Registry`]: an HTTP client with retry logic and
//! a local directory. Index fetches go through an explicit [`IndexCache`]
//! owned by the caller.

pub mod api;
pub mod cache;
pub mod client;
pub mod local;

// Re-export main types
pub use api::{PackageEntry, PackageIndex, RegistryIndex, VersionMetadata};
pub use cache::{CacheEntry, CacheStats, IndexCache};
pub use client::{RegistryClient, RetryConfig};
pub use local::LocalRegistry;

use formulary_core::error::FormularyError;
use std::future::Future;
use std::sync::Arc;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, FormularyError>;

/// Relative path of an archive under the legacy layout
pub fn legacy_archive_path(name: &str, version: &str) -> String {
    format!("packages/{name}/{version}/{name}@{version}.gspkg")
}

/// A source of package metadata and archives
pub trait Registry: Send + Sync {
    /// The registry index, served from cache when fresh
    fn index(&self) -> impl Future<Output = RegistryResult<Arc<RegistryIndex>>> + Send;

    /// Drop any cached index and fetch it again
    fn refresh(&self) -> impl Future<Output = RegistryResult<Arc<RegistryIndex>>> + Send;

    /// Archive bytes for `name` at `version`.
    ///
    /// Tries the path recorded in the index first, then the legacy layout.
    fn fetch_archive(
        &self,
        name: &str,
        version: &str,
    ) -> impl Future<Output = RegistryResult<Vec<u8>>> + Send;
}

/// Registry selected from a configured base URL
#[derive(Debug, Clone)]
pub enum RegistryBackend {
    Http(RegistryClient),
    Local(LocalRegistry),
}

impl RegistryBackend {
    /// `file://` URLs and plain paths open a local registry, anything else HTTP
    pub fn from_url(base: &str, cache: Arc<IndexCache>) -> RegistryResult<Self> {
        if let Some(path) = base.strip_prefix("file://") {
            return Ok(Self::Local(LocalRegistry::new(path)));
        }
        if !base.contains("://") {
            return Ok(Self::Local(LocalRegistry::new(base)));
        }
        Ok(Self::Http(RegistryClient::new(base, cache)?))
    }
}

impl Registry for RegistryBackend {
    async fn index(&self) -> RegistryResult<Arc<RegistryIndex>> {
        match self {
            Self::Http(client) => client.index().await,
            Self::Local(local) => local.index().await,
        }
    }

    async fn refresh(&self) -> RegistryResult<Arc<RegistryIndex>> {
        match self {
            Self::Http(client) => client.refresh().await,
            Self::Local(local) => local.refresh().await,
        }
    }

    async fn fetch_archive(&self, name: &str, version: &str) -> RegistryResult<Vec<u8>> {
        match self {
            Self::Http(client) => client.fetch_archive(name, version).await,
            Self::Local(local) => local.fetch_archive(name, version).await,
        }
    }
}

impl<R: Registry> Registry for Arc<R> {
    fn index(&self) -> impl Future<Output = RegistryResult<Arc<RegistryIndex>>> + Send {
        (**self).index()
    }

    fn refresh(&self) -> impl Future<Output = RegistryResult<Arc<RegistryIndex>>> + Send {
        (**self).refresh()
    }

    fn fetch_archive(
        &self,
        name: &str,
        version: &str,
    ) -> impl Future<Output = RegistryResult<Vec<u8>>> + Send {
        (**self).fetch_archive(name, version)
    }
}
