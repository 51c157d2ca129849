//! Path utilities for safe file system operations.
//!
//! Registry indexes name archive paths relative to their base; these helpers
//! keep such paths from escaping the base directory.

use crate::error::{FormularyError, FormularyResult};
use std::path::{Component, Path, PathBuf};

/// Normalize a path by resolving . and .. components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                // Keep a leading `..` so escaping stays visible
                if components.is_empty() {
                    components.push(component);
                } else {
                    components.pop();
                }
            },
            other => components.push(other),
        }
    }

    components.iter().collect()
}

/// Check if a path is relative and never climbs above its base
pub fn is_safe_path(path: &Path) -> bool {
    if path.is_absolute() {
        return false;
    }

    let mut depth = 0i32;
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            },
            Component::Normal(_) => depth += 1,
            _ => return false,
        }
    }

    true
}

/// Safely join paths, preventing directory traversal
pub fn safe_join(base: &Path, path: &Path) -> FormularyResult<PathBuf> {
    if !is_safe_path(path) {
        return Err(FormularyError::UnsafePath {
            path: path.display().to_string(),
        });
    }

    Ok(base.join(normalize_path(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        let path = Path::new("./packages/../packages/./stats/1.0.0/stats.gspkg");
        assert_eq!(
            normalize_path(path),
            Path::new("packages/stats/1.0.0/stats.gspkg")
        );
    }

    #[test]
    fn test_is_safe_path() {
        assert!(is_safe_path(Path::new("packages/a.gspkg")));
        assert!(is_safe_path(Path::new("./packages/a.gspkg")));
        assert!(!is_safe_path(Path::new("../../../etc/passwd")));
        assert!(!is_safe_path(Path::new("/absolute/path")));
    }

    #[test]
    fn test_safe_join() {
        let base = Path::new("/srv/registry");
        let joined = safe_join(base, Path::new("packages/a/1.0.0/a@1.0.0.gspkg")).unwrap();
        assert_eq!(joined, Path::new("/srv/registry/packages/a/1.0.0/a@1.0.0.gspkg"));

        let err = safe_join(base, Path::new("../secrets")).unwrap_err();
        assert!(matches!(err, FormularyError::UnsafePath { .. }));
    }
}
