//! # formulary
//!
//! Package manager for spreadsheet named functions.
//!
//! Parses the command line, sets up logging and dispatches to the command
//! handlers. Errors are reported with their suggestion and cause chain and
//! turn into a non-zero exit code.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use formulary_config::CliOverrides;
use formulary_core::error::FormularyError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Package manager for spreadsheet named functions
#[derive(Parser)]
#[command(name = "formulary", version, about = "Package manager for spreadsheet named functions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry base URL or local registry directory
    #[arg(long, global = true, value_name = "URL")]
    pub registry: Option<String>,

    /// Artifact cache directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Workbook file holding the named functions
    #[arg(long, global = true, value_name = "FILE")]
    pub workbook: Option<Utf8PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            registry_url: self.registry.clone(),
            cache_dir: self.cache_dir.clone(),
            workbook: self.workbook.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write initial project metadata into the workbook
    Init {
        /// Project name, defaults to the directory name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "0.1.0")]
        version: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        license: Option<String>,
        /// Overwrite existing metadata and lockfile
        #[arg(short, long)]
        force: bool,
    },
    /// Show the project, or registry details of a package
    Info {
        package: Option<String>,
        /// Show the dependencies of this version, the latest by default
        version: Option<String>,
    },
    /// Check out a registry package as the workbook's project
    Dev {
        package: String,
        /// Version to check out, the latest by default
        version: Option<String>,
    },
    /// Install packages, or reinstall the project's dependencies
    Install {
        /// Requirements such as `stats>=1.0`, or archive paths with --local
        packages: Vec<String>,
        /// Treat arguments as package archive paths
        #[arg(long)]
        local: bool,
        /// Alias a package function: `PKG:OLD=NEW`
        #[arg(long = "rename", value_name = "PKG:OLD=NEW")]
        renames: Vec<String>,
    },
    /// Remove packages and their orphaned dependencies
    Remove {
        /// Package names or local archive paths
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Upgrade packages to the newest allowed versions
    Upgrade {
        /// Packages to upgrade, all when omitted
        packages: Vec<String>,
        /// Alias a package function: `PKG:OLD=NEW`
        #[arg(long = "rename", value_name = "PKG:OLD=NEW")]
        renames: Vec<String>,
    },
    /// Build a package archive from the project's own functions
    Pack {
        #[arg(short, long, default_value = "dist")]
        out_dir: PathBuf,
    },
    /// Manage the local caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete cached archives, the cached registry index, or both
    Clear {
        #[arg(value_enum, default_value_t = ClearTarget::All)]
        target: ClearTarget,
    },
    /// Fetch the registry index again
    Update,
    /// Show cache usage
    Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    Packages,
    Index,
    All,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting formulary v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        },
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    rt.block_on(async {
        let ctx = CommandContext::new(cli.overrides()).await?;
        commands::dispatch_command(cli.command, &ctx).await?;
        Ok::<(), anyhow::Error>(())
    })
}

fn report(err: &anyhow::Error) {
    let formatter = ErrorFormatter::new();
    match err.downcast_ref::<FormularyError>() {
        Some(err) => eprintln!("{}", formatter.format_error(err)),
        None => eprintln!("{}", formatter.format_simple(&format!("{:#}", err))),
    }
}

fn setup_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("formulary encountered an unexpected error: {}", panic_info);
        eprintln!("formulary crashed! This is a bug.");
        eprintln!("Please report this at: https://github.com/formulary-dev/formulary/issues");
        eprintln!("Error: {}", panic_info);
    }));
}
