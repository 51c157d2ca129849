//! # formulary-core
//!
//! Core types and utilities shared across all Formulary crates.
//!
//! This crate provides:
//! - Version and VersionReq types for version specifiers
//! - Dependency, Package and FunctionDefinition types
//! - The Lockfile model that records function ownership
//! - FormularyError enum for unified error handling
//! - Integrity hashing and path helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, Dependency, Lockfile, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{FormularyError, FormularyResult};
pub use types::{
    ArgumentMetadata, Dependency, FunctionDefinition, Lockfile, Package, PackageLock,
    ProjectMetadata, Version, VersionReq, LOCK_FUNCTION, PROJECT_FUNCTION,
};
