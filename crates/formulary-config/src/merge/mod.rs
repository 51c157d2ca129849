//! Configuration layering, fallback logic and environment overrides

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use formulary_core::error::FormularyError;
use tracing::debug;

use crate::legacy;
use crate::settings::{Config, ConfigFile};
use crate::ConfigResult;

/// Prefix of every environment override
const ENV_PREFIX: &str = "FORMULARY_";

/// Where a layer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    /// `config.toml`
    Toml(Utf8PathBuf),
    /// Legacy `KEY=VALUE` file
    Legacy(Utf8PathBuf),
    /// `FORMULARY_*` environment variables
    Environment,
    /// Command-line flags
    CommandLine,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub registry_url: Option<String>,
    pub cache_dir: Option<Utf8PathBuf>,
    pub workbook: Option<Utf8PathBuf>,
}

impl CliOverrides {
    fn is_empty(&self) -> bool {
        self.registry_url.is_none() && self.cache_dir.is_none() && self.workbook.is_none()
    }

    fn to_layer(&self) -> ConfigFile {
        ConfigFile {
            registry_url: self.registry_url.clone(),
            cache_dir: self.cache_dir.clone(),
            workbook: self.workbook.clone(),
            ..ConfigFile::default()
        }
    }
}

/// Locates and reads the configuration files under a home directory
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    home: Utf8PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at `home`
    pub fn new(home: impl Into<Utf8PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Loader rooted at the current user's home directory
    pub fn from_home_dir() -> ConfigResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| FormularyError::ConfigValidation {
            field: "home_dir".to_string(),
            reason: "Could not determine home directory".to_string(),
        })?;
        let home = Utf8PathBuf::try_from(home).map_err(|e| FormularyError::ConfigValidation {
            field: "home_dir".to_string(),
            reason: format!("Invalid home directory path: {}", e),
        })?;
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Utf8Path {
        &self.home
    }

    /// `~/.formulary`
    pub fn config_dir(&self) -> Utf8PathBuf {
        self.home.join(".formulary")
    }

    pub fn toml_path(&self) -> Utf8PathBuf {
        self.config_dir().join("config.toml")
    }

    pub fn legacy_path(&self) -> Utf8PathBuf {
        self.config_dir().join("config")
    }

    /// Read the file layer: `config.toml`, else the legacy file, else nothing
    pub async fn load_file_layer(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        let toml_path = self.toml_path();
        if let Some(content) = read_optional(&toml_path).await? {
            let layer = ConfigFile::parse(&content, toml_path.as_str())?;
            return Ok(Some((layer, ConfigSource::Toml(toml_path))));
        }

        let legacy_path = self.legacy_path();
        if let Some(content) = read_optional(&legacy_path).await? {
            let layer = legacy::to_layer(&legacy::parse_key_values(&content));
            return Ok(Some((layer, ConfigSource::Legacy(legacy_path))));
        }

        Ok(None)
    }

    /// Resolve the final configuration and the layers that contributed to it
    pub async fn load(
        &self,
        env: &HashMap<String, String>,
        cli: &CliOverrides,
    ) -> ConfigResult<(Config, Vec<ConfigSource>)> {
        let mut config = Config::defaults(&self.home);
        let mut sources = vec![ConfigSource::Defaults];

        if let Some((layer, source)) = self.load_file_layer().await? {
            layer.apply_to(&mut config);
            sources.push(source);
        }

        let env_layer = ConfigLayering::env_layer(env);
        if env_layer != ConfigFile::default() {
            env_layer.apply_to(&mut config);
            sources.push(ConfigSource::Environment);
        }

        if !cli.is_empty() {
            cli.to_layer().apply_to(&mut config);
            sources.push(ConfigSource::CommandLine);
        }

        config.validate()?;
        debug!(?sources, registry = %config.registry_url, "configuration loaded");
        Ok((config, sources))
    }
}

async fn read_optional(path: &Utf8Path) -> ConfigResult<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FormularyError::io(format!("Failed to read {}", path), e)),
    }
}

/// Environment handling
pub struct ConfigLayering;

impl ConfigLayering {
    /// Collect `FORMULARY_*` variables from the process environment
    pub fn collect_env_overrides() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect()
    }

    /// Environment variables as a configuration layer
    pub fn env_layer(env: &HashMap<String, String>) -> ConfigFile {
        let mut layer = ConfigFile::default();
        if let Some(url) = env.get("FORMULARY_REGISTRY_URL") {
            layer.registry_url = Some(url.clone());
        }
        if let Some(dir) = env.get("FORMULARY_CACHE_DIR") {
            layer.cache_dir = Some(Utf8PathBuf::from(dir));
        }
        if let Some(workbook) = env.get("FORMULARY_WORKBOOK") {
            layer.workbook = Some(Utf8PathBuf::from(workbook));
        }
        layer
    }
}
