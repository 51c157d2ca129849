//! Package artifacts for Formulary
//!
//! This crate provides the on-disk artifact cache (one archive per package
//! name and version) and the `.gspkg` archive format itself.

pub mod archive;
pub mod artifact;

// Re-export main types
pub use archive::{
    build_archive, create_archive, extract_archive, extract_archive_bytes, ExtractedPackage,
};
pub use artifact::{ArtifactCache, ArtifactStats, ARTIFACT_EXTENSION};

use formulary_core::error::FormularyError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, FormularyError>;
