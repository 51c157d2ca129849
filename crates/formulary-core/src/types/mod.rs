//! Core data types for Formulary package management.
//!
//! This module provides the fundamental types used throughout the Formulary crates:
//! - Version types for version specifiers
//! - Dependency requirements and resolution candidates
//! - Named function definitions
//! - Project metadata and the ownership lockfile

pub mod dependency;
pub mod function;
pub mod lockfile;
pub mod package;
pub mod version;

// Re-export all public types
pub use dependency::Dependency;
pub use function::{
    is_reserved, ArgumentMetadata, FunctionDefinition, DEFAULT_ARGUMENT_DESCRIPTION,
    DEFAULT_ARGUMENT_EXAMPLE, LOCK_FUNCTION, PROJECT_FUNCTION,
};
pub use lockfile::{Lockfile, PackageLock, LOCAL_VERSION};
pub use package::{Package, ProjectMetadata};
pub use version::{Comparator, Op, PartialVersion, Version, VersionError, VersionReq};
