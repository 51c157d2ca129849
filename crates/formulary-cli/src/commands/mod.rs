//! Command implementations and dispatch logic.
//!
//! Each command is an async function taking the shared [`CommandContext`].

use camino::{Utf8Path, Utf8PathBuf};
use formulary_cache::ArtifactCache;
use formulary_config::{CliOverrides, Config, ConfigLayering, ConfigLoader};
use formulary_core::error::{FormularyError, FormularyResult};
use formulary_installer::{InitOptions, Reconciler, WorkbookFile};
use formulary_registry::{IndexCache, RegistryBackend, RegistryClient, RetryConfig};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod aliases;
pub mod cache;
pub mod dev;
pub mod info;
pub mod init;
pub mod install;
pub mod pack;
pub mod remove;
pub mod upgrade;

#[cfg(test)]
mod tests;

use crate::{output::OutputHandler, Commands};

/// Workbook used when none is configured, relative to the working directory
pub const DEFAULT_WORKBOOK: &str = "workbook.json";

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: Utf8PathBuf,
    pub config: Config,
    pub output: OutputHandler,
    /// Whether collisions may be resolved by asking on stdin
    pub interactive: bool,
}

impl CommandContext {
    /// Load the configuration and capture the working directory
    pub async fn new(overrides: CliOverrides) -> FormularyResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| FormularyError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| FormularyError::ConfigValidation {
            field: "cwd".to_string(),
            reason: format!("{} is not valid UTF-8", path.display()),
        })?;

        let loader = ConfigLoader::from_home_dir()?;
        let env = ConfigLayering::collect_env_overrides();
        let (config, sources) = loader.load(&env, &overrides).await?;
        info!(?sources, "configuration sources");

        Ok(Self {
            cwd,
            config,
            output: OutputHandler::new(),
            interactive: std::io::stdin().is_terminal(),
        })
    }

    /// A path given by the user, relative to the working directory
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Same as [`resolve`](Self::resolve) for paths that came from clap
    pub fn resolve_std(&self, path: &Path) -> std::path::PathBuf {
        self.cwd.as_std_path().join(path)
    }

    /// The workbook file commands read and write
    pub fn workbook(&self) -> WorkbookFile {
        let path = self
            .config
            .workbook
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_WORKBOOK));
        WorkbookFile::new(self.resolve(&path))
    }

    /// Registry index cache persisted in the cache directory
    pub fn index_cache(&self) -> Arc<IndexCache> {
        Arc::new(IndexCache::persistent(self.config.index_cache_path()))
    }

    /// The configured registry
    pub fn registry(&self) -> FormularyResult<Arc<RegistryBackend>> {
        let base = self.config.registry_url.as_str();
        let cache = self.index_cache();

        let backend = if base.contains("://") && !base.starts_with("file://") {
            let retry = RetryConfig {
                max_retries: self.config.network.max_retries,
                ..RetryConfig::default()
            };
            RegistryBackend::Http(RegistryClient::with_options(
                base,
                cache,
                Duration::from_secs(self.config.network.timeout_secs),
                retry,
            )?)
        } else {
            RegistryBackend::from_url(base, cache)?
        };
        Ok(Arc::new(backend))
    }

    /// The artifact cache
    pub fn artifacts(&self) -> FormularyResult<Arc<ArtifactCache>> {
        Ok(Arc::new(ArtifactCache::new(self.config.cache_dir.clone())?))
    }

    /// Reconciler wired to the configured registry and cache
    pub fn reconciler(&self) -> FormularyResult<Reconciler<RegistryBackend>> {
        Ok(Reconciler::new(self.registry()?, self.artifacts()?)
            .with_max_rounds(self.config.resolver.max_rounds))
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> FormularyResult<()> {
    match command {
        Commands::Init {
            name,
            version,
            description,
            author,
            license,
            force,
        } => {
            info!("Initializing project (name: {:?}, force: {})", name, force);
            let options = InitOptions {
                version,
                description,
                author,
                license,
                force,
                ..InitOptions::default()
            };
            init::execute(name, options, ctx).await
        },
        Commands::Info { package, version } => info::execute(package, version, ctx).await,
        Commands::Dev { package, version } => {
            info!("Developing {} ({:?})", package, version);
            dev::execute(package, version, ctx).await
        },
        Commands::Install {
            packages,
            local,
            renames,
        } => {
            info!("Installing {:?} (local: {})", packages, local);
            install::execute(packages, local, renames, ctx).await
        },
        Commands::Remove { packages } => {
            info!("Removing {:?}", packages);
            remove::execute(packages, ctx).await
        },
        Commands::Upgrade { packages, renames } => {
            info!("Upgrading {:?}", packages);
            upgrade::execute(packages, renames, ctx).await
        },
        Commands::Pack { out_dir } => pack::execute(out_dir, ctx).await,
        Commands::Cache { action } => cache::execute(action, ctx).await,
        Commands::Version => show_version(ctx).await,
    }
}

async fn show_version(ctx: &CommandContext) -> FormularyResult<()> {
    let target = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);

    ctx.output.line(&format!("formulary v{}", env!("CARGO_PKG_VERSION")));
    ctx.output.field("Built", env!("BUILD_DATE"));
    ctx.output.field("Target", &target);
    ctx.output.field("Rust", env!("RUSTC_VERSION"));
    ctx.output.field("Registry", &ctx.config.registry_url);
    ctx.output.field("Cache", ctx.config.cache_dir.as_str());
    Ok(())
}
