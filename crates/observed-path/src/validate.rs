//! Validation functions for dotted paths.

use thiserror::Error;

use crate::SEPARATOR;

/// Maximum allowed path string length in bytes.
const MAX_PATH_LENGTH: usize = 1024;

/// Maximum allowed path depth.
const MAX_PATH_DEPTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("PATH_TOO_LONG")]
    PathTooLong,
    #[error("PATH_TOO_DEEP")]
    PathTooDeep,
    #[error("empty path segment at position {0}")]
    EmptySegment(usize),
    #[error("path contains whitespace")]
    Whitespace,
}

/// Check that a dotted path is conservative: bounded, without empty segments
/// or whitespace. Listener registrations accept any path; this is for hosts
/// that build paths themselves.
///
/// The empty path (the observed root) is valid.
///
/// # Errors
///
/// Returns an error if:
/// - The path exceeds the maximum length (1024 bytes)
/// - The path has more than 256 segments
/// - Any segment is empty (`"a..b"`, `".a"`, `"a."`)
/// - The path contains whitespace
///
/// # Example
///
/// ```
/// use observed_path::validate_path;
///
/// validate_path("").unwrap();
/// validate_path("nested.tags.3").unwrap();
/// validate_path("nested..tags").unwrap_err();
/// validate_path("first name").unwrap_err();
/// ```
pub fn validate_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Ok(());
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(PathError::PathTooLong);
    }
    if path.chars().any(char::is_whitespace) {
        return Err(PathError::Whitespace);
    }
    let mut depth = 0;
    for (position, segment) in path.split(SEPARATOR).enumerate() {
        if segment.is_empty() {
            return Err(PathError::EmptySegment(position));
        }
        depth += 1;
    }
    if depth > MAX_PATH_DEPTH {
        return Err(PathError::PathTooDeep);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_root_path() {
        assert!(validate_path("").is_ok());
    }

    #[test]
    fn test_validate_nested_path() {
        assert!(validate_path("name").is_ok());
        assert!(validate_path("first.0.name").is_ok());
        assert!(validate_path("nested.tags.length").is_ok());
    }

    #[test]
    fn test_validate_empty_segments() {
        assert_eq!(validate_path(".a"), Err(PathError::EmptySegment(0)));
        assert_eq!(validate_path("a."), Err(PathError::EmptySegment(1)));
        assert_eq!(validate_path("a..b"), Err(PathError::EmptySegment(1)));
    }

    #[test]
    fn test_validate_whitespace() {
        assert_eq!(validate_path("a b"), Err(PathError::Whitespace));
        assert_eq!(validate_path("a\tb"), Err(PathError::Whitespace));
    }

    #[test]
    fn test_validate_long_path() {
        let long_path = "a".repeat(2000);
        assert_eq!(validate_path(&long_path), Err(PathError::PathTooLong));
    }

    #[test]
    fn test_validate_deep_path() {
        let deep: Vec<&str> = std::iter::repeat("a").take(300).collect();
        assert_eq!(validate_path(&deep.join(".")), Err(PathError::PathTooDeep));
        let max: Vec<&str> = std::iter::repeat("a").take(256).collect();
        assert!(validate_path(&max.join(".")).is_ok());
    }
}
