//! Utility functions and helpers.
//!
//! Common functionality used across multiple Formulary crates.

pub mod hash;
pub mod path;

// Re-export commonly used utilities
pub use hash::{function_hash, integrity_of, verify_integrity};
pub use path::{is_safe_path, normalize_path, safe_join};
