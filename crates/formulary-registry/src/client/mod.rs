//! HTTP registry client with connection pooling and retry logic

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::RegistryIndex;
use crate::cache::IndexCache;
use crate::{legacy_archive_path, Registry, RegistryResult};
use formulary_core::error::FormularyError;

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Registry served over HTTP(S), e.g. a raw GitHub repository
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    /// Retry configuration
    retry_config: RetryConfig,
    /// Base registry URL without trailing slash
    base_url: String,
    /// Shared index cache
    cache: Arc<IndexCache>,
}

impl RegistryClient {
    /// Create a client for `base_url` with default timeout and retries
    pub fn new(base_url: &str, cache: Arc<IndexCache>) -> RegistryResult<Self> {
        Self::with_options(base_url, cache, Duration::from_secs(30), RetryConfig::default())
    }

    /// Create a client with an explicit request timeout and retry policy
    pub fn with_options(
        base_url: &str,
        cache: Arc<IndexCache>,
        timeout: Duration,
        retry_config: RetryConfig,
    ) -> RegistryResult<Self> {
        Url::parse(base_url).map_err(|e| FormularyError::ConfigValidation {
            field: "registry_url".to_string(),
            reason: format!("'{}' is not a valid URL: {}", base_url, e),
        })?;

        let client = ClientBuilder::new()
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .gzip(true)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FormularyError::network(format!("Failed to create HTTP client: {}", e), e))?;

        Ok(Self {
            client,
            retry_config,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Replace the retry policy
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Base registry URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Execute a request with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, operation: F) -> RegistryResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = RegistryResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    // Only transport failures are worth another attempt
                    if attempt >= self.retry_config.max_retries
                        || !matches!(error, FormularyError::Network { .. })
                    {
                        return Err(error);
                    }

                    attempt += 1;
                    warn!(attempt, error = %error, "registry request failed, retrying");
                    tokio::time::sleep(delay).await;

                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                },
            }
        }
    }

    /// GET `url`; `None` on 404
    async fn get_bytes(&self, url: &str) -> RegistryResult<Option<Vec<u8>>> {
        self.with_retry(|| async {
            debug!(url, "GET");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FormularyError::network(format!("Failed to fetch {}: {}", url, e), e))?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let bytes = response.bytes().await.map_err(|e| {
                        FormularyError::network(format!("Failed to read {}: {}", url, e), e)
                    })?;
                    Ok(Some(bytes.to_vec()))
                },
                status => Err(FormularyError::Network {
                    message: format!("Registry returned status {} for {}", status, url),
                    source: None,
                }),
            }
        })
        .await
    }

    async fn fetch_index(&self) -> RegistryResult<Arc<RegistryIndex>> {
        let url = self.url_for("index.json");
        let data = self.get_bytes(&url).await?.ok_or_else(|| FormularyError::Network {
            message: format!("Registry index not found at {}", url),
            source: None,
        })?;

        let index = Arc::new(RegistryIndex::from_json(&data)?);
        info!(registry = %self.base_url, packages = index.len(), "fetched registry index");
        self.cache.insert(&self.base_url, index.clone());
        Ok(index)
    }
}

impl Registry for RegistryClient {
    async fn index(&self) -> RegistryResult<Arc<RegistryIndex>> {
        if let Some(index) = self.cache.get(&self.base_url) {
            debug!(registry = %self.base_url, "index cache hit");
            return Ok(index);
        }
        self.fetch_index().await
    }

    async fn refresh(&self) -> RegistryResult<Arc<RegistryIndex>> {
        self.cache.invalidate(&self.base_url);
        self.fetch_index().await
    }

    async fn fetch_archive(&self, name: &str, version: &str) -> RegistryResult<Vec<u8>> {
        let legacy = legacy_archive_path(name, version);
        let index = self.index().await?;
        let primary = index
            .package(name)
            .and_then(|entry| entry.versions.get(version))
            .and_then(|meta| meta.path.clone())
            .unwrap_or_else(|| legacy.clone());

        let mut data = self.get_bytes(&self.url_for(&primary)).await?;
        if data.is_none() && primary != legacy {
            debug!(package = name, version, "archive missing at index path, trying legacy layout");
            data = self.get_bytes(&self.url_for(&legacy)).await?;
        }

        let data = data.ok_or_else(|| FormularyError::VersionNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })?;

        debug!(package = name, version, bytes = data.len(), "downloaded archive");
        Ok(data)
    }
}

#[cfg(test)]
mod tests;
