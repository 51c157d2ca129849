//! `config.toml` parsing and the resolved settings

use camino::{Utf8Path, Utf8PathBuf};
use formulary_core::error::FormularyError;
use serde::{Deserialize, Serialize};

use crate::ConfigResult;

/// Registry used when nothing else is configured
pub const DEFAULT_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/formulary-registry/registry/main";

/// Default limit on resolver rounds
pub const DEFAULT_MAX_ROUNDS: usize = 200_000;

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Registry base URL, or a local directory
    pub registry_url: String,
    /// Artifact cache root
    pub cache_dir: Utf8PathBuf,
    /// Workbook file holding the named functions
    pub workbook: Option<Utf8PathBuf>,
    pub resolver: ResolverSection,
    pub network: NetworkSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSection {
    pub max_rounds: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSection {
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Config {
    /// Defaults for a user whose home directory is `home`
    pub fn defaults(home: &Utf8Path) -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            cache_dir: home.join(".formulary").join("cache"),
            workbook: None,
            resolver: ResolverSection::default(),
            network: NetworkSection::default(),
        }
    }

    /// Index cache file kept next to the artifacts
    pub fn index_cache_path(&self) -> Utf8PathBuf {
        self.cache_dir.join("index-cache.json")
    }

    /// Check values that would only fail later and obscurely
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, reason: &str| FormularyError::ConfigValidation {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.registry_url.trim().is_empty() {
            return Err(invalid("registry_url", "must not be empty"));
        }
        if self.resolver.max_rounds == 0 {
            return Err(invalid("resolver.max_rounds", "must be greater than zero"));
        }
        if self.network.timeout_secs == 0 {
            return Err(invalid("network.timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }
}

/// One configuration layer; unset keys leave lower layers alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<Utf8PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbook: Option<Utf8PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
}

impl ConfigFile {
    /// Parse TOML text; `path` is used in errors
    pub fn parse(content: &str, path: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| FormularyError::TomlParse {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Render as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| FormularyError::ConfigValidation {
            field: "config".to_string(),
            reason: e.to_string(),
        })
    }

    /// Overwrite the keys this layer sets
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.registry_url {
            config.registry_url = url.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(workbook) = &self.workbook {
            config.workbook = Some(workbook.clone());
        }
        if let Some(max_rounds) = self.resolver.as_ref().and_then(|r| r.max_rounds) {
            config.resolver.max_rounds = max_rounds;
        }
        if let Some(network) = &self.network {
            if let Some(timeout) = network.timeout_secs {
                config.network.timeout_secs = timeout;
            }
            if let Some(retries) = network.max_retries {
                config.network.max_retries = retries;
            }
        }
    }
}
