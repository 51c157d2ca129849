//! SHA-256 hashing utilities for archive integrity.
//!
//! Integrity strings have the form `sha256:<hex>` over the full archive bytes.

use crate::error::{FormularyError, FormularyResult};
use crate::types::FunctionDefinition;
use sha2::{Digest, Sha256};

/// Prefix of every integrity string
pub const INTEGRITY_PREFIX: &str = "sha256:";

/// Compute the hex SHA-256 digest of data
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Integrity string for a byte buffer
pub fn integrity_of(data: &[u8]) -> String {
    format!("{}{}", INTEGRITY_PREFIX, sha256_hex(data))
}

/// Integrity string for a file on disk
pub fn integrity_of_file(path: &std::path::Path) -> FormularyResult<String> {
    let data = std::fs::read(path)
        .map_err(|e| FormularyError::io(format!("Failed to read file: {}", path.display()), e))?;
    Ok(integrity_of(&data))
}

/// Verify data integrity against an expected integrity string
pub fn verify_integrity(package: &str, data: &[u8], expected: &str) -> FormularyResult<()> {
    let actual = integrity_of(data);
    if actual == expected {
        Ok(())
    } else {
        Err(FormularyError::IntegrityFailure {
            package: package.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Short content hash of a function (definition, description, arguments).
///
/// Used to skip writes when a function body is unchanged.
pub fn function_hash(function: &FunctionDefinition) -> String {
    let canonical = serde_json::json!({
        "arguments": function.arguments,
        "definition": function.definition,
        "description": function.description.as_deref().unwrap_or(""),
    });
    let digest = sha256_hex(canonical.to_string().as_bytes());
    digest[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_integrity_format() {
        let integrity = integrity_of(b"hello world");
        assert_eq!(
            integrity,
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_verify_integrity() {
        let data = b"test data";
        let expected = integrity_of(data);
        assert!(verify_integrity("pkg", data, &expected).is_ok());

        let err = verify_integrity("pkg", b"other", &expected).unwrap_err();
        assert!(matches!(err, FormularyError::IntegrityFailure { .. }));
    }

    #[test]
    fn test_integrity_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        assert_eq!(integrity_of_file(file.path()).unwrap(), integrity_of(b"hello world"));
    }

    #[test]
    fn test_function_hash_tracks_body() {
        let a = FunctionDefinition::new("F", "=1+1");
        let b = FunctionDefinition::new("G", "=1+1");
        let c = FunctionDefinition::new("F", "=1+2");

        assert_eq!(function_hash(&a).len(), 12);
        // The name is not part of the content
        assert_eq!(function_hash(&a), function_hash(&b));
        assert_ne!(function_hash(&a), function_hash(&c));
    }
}
