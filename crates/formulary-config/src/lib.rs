//! Configuration for Formulary
//!
//! Settings are layered: built-in defaults, then `~/.formulary/config.toml`
//! (or the legacy `~/.formulary/config` `KEY=VALUE` file when no TOML file
//! exists), then `FORMULARY_*` environment variables, then command-line flags.

pub mod legacy;
pub mod merge;
pub mod settings;

// Re-export main types
pub use merge::{CliOverrides, ConfigLayering, ConfigLoader, ConfigSource};
pub use settings::{Config, ConfigFile, NetworkSection, ResolverSection, DEFAULT_REGISTRY_URL};

use formulary_core::error::FormularyError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, FormularyError>;
