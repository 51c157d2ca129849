//! Error types and result aliases for Formulary operations.
//!
//! Provides a unified error type that covers all possible error conditions
//! across the Formulary crates with actionable error messages. Resolution and
//! collision failures carry structured payloads so callers can branch on data.

use crate::types::{Dependency, VersionError};
use thiserror::Error;

/// Unified error type for all Formulary operations
#[derive(Error, Debug)]
pub enum FormularyError {
    // Config errors
    #[error("Failed to parse {path}: {message}")]
    TomlParse { path: String, message: String },

    #[error("Failed to parse JSON in {context}: {message}")]
    JsonParse { context: String, message: String },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("No project initialized. Run 'formulary init' first")]
    NoProject,

    #[error("Workbook already contains project '{name}'")]
    ProjectExists { name: String },

    // Requirement errors
    #[error("Invalid requirement '{input}': {reason}")]
    InvalidRequirement { input: String, reason: String },

    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    // Registry errors
    #[error("Package '{name}' not found in registry")]
    PackageNotFound { name: String },

    #[error("Version {version} of package '{name}' not found")]
    VersionNotFound { name: String, version: String },

    #[error("Local package not found at {path}")]
    LocalPackageMissing { path: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Resolution errors
    #[error("Could not satisfy requirements: {}", format_requirements(.requirements))]
    UnsatisfiableRequirements { requirements: Vec<Dependency> },

    #[error("Resolution exceeded {rounds} rounds without converging")]
    ResolutionTooComplex { rounds: usize },

    // Install errors
    #[error("Package '{package}' has conflicting functions: {}", .conflicts.join(", "))]
    FunctionCollision {
        package: String,
        conflicts: Vec<String>,
    },

    #[error("Package '{name}' is not installed")]
    NotInstalled { name: String },

    #[error("Project '{name}' has no functions of its own to pack")]
    NothingToPack { name: String },

    // Archive errors
    #[error("Archive {path} is corrupt: {reason}")]
    ArchiveCorrupt { path: String, reason: String },

    #[error("Integrity check failed for {package}: expected {expected}, got {actual}")]
    IntegrityFailure {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("Refusing unsafe path: {path}")]
    UnsafePath { path: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for Formulary operations
pub type FormularyResult<T> = Result<T, FormularyError>;

fn format_requirements(requirements: &[Dependency]) -> String {
    requirements
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FormularyError {
    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Create a JSON error with the place it happened
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
        }
    }

    /// Check if this error is recoverable.
    ///
    /// A collision is recoverable: the caller supplies aliases and retries.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FormularyError::Network { .. }
                | FormularyError::Io { .. }
                | FormularyError::FunctionCollision { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            FormularyError::PackageNotFound { .. } => {
                Some("Check the package name spelling or run 'formulary cache update'")
            },
            FormularyError::VersionNotFound { .. } => {
                Some("Run 'formulary info <package>' to list the published versions")
            },
            FormularyError::Network { .. } => Some("Check your internet connection and try again"),
            FormularyError::UnsatisfiableRequirements { .. } => {
                Some("Relax the version specifiers or upgrade the conflicting packages")
            },
            FormularyError::FunctionCollision { .. } => {
                Some("Install again and provide an alias for each conflicting function")
            },
            FormularyError::NotInstalled { .. } => {
                Some("Check the installed packages with 'formulary info'")
            },
            FormularyError::NoProject => Some("Run 'formulary init' to create the project metadata"),
            FormularyError::ProjectExists { .. } => {
                Some("Start package development in a workbook without project metadata")
            },
            FormularyError::IntegrityFailure { .. } => {
                Some("Run 'formulary cache clear packages' and install again")
            },
            FormularyError::LocalPackageMissing { .. } => {
                Some("Check the path passed to --local")
            },
            FormularyError::NothingToPack { .. } => {
                Some("Define at least one named function that no installed package owns")
            },
            FormularyError::ResolutionTooComplex { .. } => {
                Some("Pin some dependencies to narrow the search")
            },
            _ => None,
        }
    }
}
