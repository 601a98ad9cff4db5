//! Dotted path utilities for observed object graphs.
//!
//! A path is the chain of property names and collection indices leading from
//! an observed root to a property, joined with `.`. The root itself has the
//! empty path, so root-level properties carry no prefix.
//!
//! # Example
//!
//! ```
//! use observed_path::{resolve, split};
//!
//! let tags = resolve("nested", "tags");
//! assert_eq!(tags, "nested.tags");
//! assert_eq!(resolve(&tags, 3usize), "nested.tags.3");
//! assert_eq!(resolve("", "name"), "name");
//! assert_eq!(split("nested.tags.3"), vec!["nested", "tags", "3"]);
//! ```
//!
//! Separator characters inside keys are not escaped: a key `"a.b"` at the root
//! yields the same path as key `"b"` nested under key `"a"`.

pub mod segment;
pub use segment::{as_index, Segment};

pub mod validate;
pub use validate::{validate_path, PathError};

/// Separator placed between path segments.
pub const SEPARATOR: char = '.';

/// Join a parent path and a key into a child path.
///
/// # Example
///
/// ```
/// use observed_path::resolve;
///
/// assert_eq!(resolve("", "name"), "name");
/// assert_eq!(resolve("first", 0usize), "first.0");
/// assert_eq!(resolve("first.0", "name"), "first.0.name");
/// ```
pub fn resolve<'a>(parent: &str, key: impl Into<Segment<'a>>) -> String {
    let key = key.into();
    if parent.is_empty() {
        return key.to_string();
    }
    format!("{parent}{SEPARATOR}{key}")
}

/// Split a path into its segments.
///
/// The root path has no segments.
pub fn split(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEPARATOR).collect()
}

/// Number of segments in a path.
pub fn depth(path: &str) -> usize {
    if path.is_empty() {
        return 0;
    }
    path.matches(SEPARATOR).count() + 1
}

/// Returns the parent path, or `None` for the root.
///
/// # Example
///
/// ```
/// use observed_path::parent;
///
/// assert_eq!(parent("nested.tags.3"), Some("nested.tags"));
/// assert_eq!(parent("name"), Some(""));
/// assert_eq!(parent(""), None);
/// ```
pub fn parent(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(pos) => Some(&path[..pos]),
        None => Some(""),
    }
}

/// Returns the final segment of a path, or `None` for the root.
pub fn last_segment(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(pos) => Some(&path[pos + SEPARATOR.len_utf8()..]),
        None => Some(path),
    }
}

/// Check whether `path` equals `ancestor` or lies underneath it.
///
/// The comparison is segment-aware: `"tagsx"` is not within `"tags"`.
///
/// # Example
///
/// ```
/// use observed_path::is_within;
///
/// assert!(is_within("nested.tags.3", "nested"));
/// assert!(is_within("nested", "nested"));
/// assert!(is_within("anything", ""));
/// assert!(!is_within("nestedx.tags", "nested"));
/// ```
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    match path.strip_prefix(ancestor) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEPARATOR),
        None => false,
    }
}
