//! Path segment type.

use std::fmt;

/// A single step of a dotted path.
///
/// Record containers are addressed by name, ordered containers by index. Both
/// render the same way once joined into a path, so `Index(3)` and `Name("3")`
/// produce identical paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment<'a> {
    Name(&'a str),
    Index(usize),
}

impl<'a> Segment<'a> {
    /// Classify a raw key.
    ///
    /// Canonical decimal integers (`"0"`, `"17"`, but not `"007"` or `"+1"`)
    /// become [`Segment::Index`]; everything else is a [`Segment::Name`].
    ///
    /// # Example
    ///
    /// ```
    /// use observed_path::Segment;
    ///
    /// assert_eq!(Segment::parse("3"), Segment::Index(3));
    /// assert_eq!(Segment::parse("03"), Segment::Name("03"));
    /// assert_eq!(Segment::parse("length"), Segment::Name("length"));
    /// ```
    pub fn parse(raw: &'a str) -> Self {
        match as_index(raw) {
            Some(index) => Segment::Index(index),
            None => Segment::Name(raw),
        }
    }

    /// Returns the index when this segment addresses a collection element.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Name(name) => as_index(name),
        }
    }
}

/// Parse a canonical array index, mirroring how ordered collections name their
/// elements.
pub fn as_index(raw: &str) -> Option<usize> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse().ok()
}

impl<'a> From<&'a str> for Segment<'a> {
    fn from(name: &'a str) -> Self {
        Segment::Name(name)
    }
}

impl<'a> From<&'a String> for Segment<'a> {
    fn from(name: &'a String) -> Self {
        Segment::Name(name.as_str())
    }
}

impl From<usize> for Segment<'_> {
    fn from(index: usize) -> Self {
        Segment::Index(index)
    }
}

impl fmt::Display for Segment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Name(name) => f.write_str(name),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_indices() {
        assert_eq!(Segment::parse("0"), Segment::Index(0));
        assert_eq!(Segment::parse("42"), Segment::Index(42));
        assert_eq!(Segment::parse(""), Segment::Name(""));
        assert_eq!(Segment::parse("-1"), Segment::Name("-1"));
        assert_eq!(Segment::parse("1e3"), Segment::Name("1e3"));
        assert_eq!(Segment::parse("00"), Segment::Name("00"));
    }

    #[test]
    fn test_as_index_on_names() {
        assert_eq!(Segment::Name("7").as_index(), Some(7));
        assert_eq!(Segment::Name("length").as_index(), None);
        assert_eq!(Segment::Index(9).as_index(), Some(9));
    }

    #[test]
    fn test_display() {
        assert_eq!(Segment::Name("tags").to_string(), "tags");
        assert_eq!(Segment::Index(3).to_string(), "3");
    }
}
