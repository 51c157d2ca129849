//! Version resolution for Formulary
//!
//! Given root requirements and a package index, the resolver picks exactly
//! one version per package name such that every requirement reachable from
//! the roots is satisfied. The search is a deterministic backtracking solver
//! that prefers the newest compatible version and resolves the most
//! constrained package first.

pub mod provider;
pub mod sat;
pub mod semver;

// Re-export main types
pub use provider::{IndexProvider, Provider, Requirement};
pub use sat::{ResolutionResult, Resolver, DEFAULT_MAX_ROUNDS};
pub use semver::VersionSelector;

use formulary_core::error::FormularyError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, FormularyError>;
