//! Registry index caching with TTL support
//!
//! The cache is an explicit object owned by the caller and shared with the
//! registry clients. It can optionally persist to a JSON file so a fetched
//! index survives between runs.

use crate::api::RegistryIndex;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default time-to-live for a cached index (1 hour)
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached index
    pub index: Arc<RegistryIndex>,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create new cache entry with default TTL (1 hour)
    pub fn new(index: Arc<RegistryIndex>) -> Self {
        Self::with_ttl(index, Duration::seconds(DEFAULT_TTL_SECS))
    }

    /// Create cache entry with custom TTL
    pub fn with_ttl(index: Arc<RegistryIndex>, ttl: Duration) -> Self {
        Self {
            index,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        let age = Utc::now() - self.stored_at;
        // A timestamp from the future means the clock moved; treat as stale
        age >= Duration::zero() && age < self.ttl
    }

    /// Get age of cache entry
    pub fn age(&self) -> Duration {
        Utc::now() - self.stored_at
    }
}

/// On-disk form of one entry
#[derive(Serialize)]
struct PersistedEntryRef<'a> {
    base_url: &'a str,
    stored_at: DateTime<Utc>,
    ttl_secs: i64,
    index: &'a RegistryIndex,
}

#[derive(Deserialize)]
struct PersistedEntry {
    base_url: String,
    stored_at: DateTime<Utc>,
    ttl_secs: i64,
    index: RegistryIndex,
}

/// Registry indexes keyed by registry base URL
#[derive(Debug)]
pub struct IndexCache {
    /// Cache storage
    cache: DashMap<String, CacheEntry>,
    /// TTL applied by `insert`
    ttl: Duration,
    /// JSON file mirroring the cache, if persistent
    path: Option<Utf8PathBuf>,
}

impl IndexCache {
    /// Create an in-memory cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            path: None,
        }
    }

    /// Set the TTL for new entries
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create a cache mirrored to `path`, loading any entries already there.
    ///
    /// An unreadable or corrupt file starts an empty cache.
    pub fn persistent(path: impl Into<Utf8PathBuf>) -> Self {
        let path = path.into();
        let cache = DashMap::new();

        match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<Vec<PersistedEntry>>(&data) {
                Ok(entries) => {
                    for entry in entries {
                        cache.insert(
                            entry.base_url,
                            CacheEntry {
                                index: Arc::new(entry.index),
                                stored_at: entry.stored_at,
                                ttl: Duration::seconds(entry.ttl_secs),
                            },
                        );
                    }
                    debug!(path = %path, entries = cache.len(), "loaded index cache");
                },
                Err(e) => warn!(path = %path, error = %e, "ignoring corrupt index cache"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %path, error = %e, "could not read index cache"),
        }

        Self {
            cache,
            ttl: Duration::seconds(DEFAULT_TTL_SECS),
            path: Some(path),
        }
    }

    /// Backing file, if persistent
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Get the cached index for `base_url` if fresh
    pub fn get(&self, base_url: &str) -> Option<Arc<RegistryIndex>> {
        let fresh = self
            .cache
            .get(base_url)
            .map(|entry| entry.is_fresh().then(|| entry.index.clone()));

        match fresh {
            Some(Some(index)) => Some(index),
            Some(None) => {
                // Guard released above; safe to remove the stale entry
                self.cache.remove(base_url);
                None
            },
            None => None,
        }
    }

    /// Store an index with the cache TTL
    pub fn insert(&self, base_url: &str, index: Arc<RegistryIndex>) {
        self.cache
            .insert(base_url.to_string(), CacheEntry::with_ttl(index, self.ttl));
        self.persist();
    }

    /// Drop the entry for `base_url`; returns whether one existed
    pub fn invalidate(&self, base_url: &str) -> bool {
        let removed = self.cache.remove(base_url).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    /// Check if `base_url` is cached and fresh
    pub fn contains_fresh(&self, base_url: &str) -> bool {
        self.cache
            .get(base_url)
            .map(|entry| entry.is_fresh())
            .unwrap_or(false)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut fresh_count = 0;
        let mut stale_count = 0;

        for entry in self.cache.iter() {
            if entry.is_fresh() {
                fresh_count += 1;
            } else {
                stale_count += 1;
            }
        }

        CacheStats {
            total_entries: self.cache.len(),
            fresh_entries: fresh_count,
            stale_entries: stale_count,
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.cache.clear();
        self.persist();
    }

    /// Remove stale entries
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        self.cache.retain(|_, entry| {
            if entry.is_fresh() {
                true
            } else {
                removed += 1;
                false
            }
        });
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Write the cache file; failures only cost a refetch next run
    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let snapshot: Vec<(String, CacheEntry)> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let entries: Vec<PersistedEntryRef<'_>> = snapshot
            .iter()
            .map(|(base_url, entry)| PersistedEntryRef {
                base_url,
                stored_at: entry.stored_at,
                ttl_secs: entry.ttl.num_seconds(),
                index: &entry.index,
            })
            .collect();

        let result = serde_json::to_vec(&entries)
            .map_err(std::io::Error::from)
            .and_then(|data| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, data)
            });
        if let Err(e) = result {
            warn!(path = %path, error = %e, "could not persist index cache");
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of fresh entries
    pub fresh_entries: usize,
    /// Number of stale entries
    pub stale_entries: usize,
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new()
    }
}
