//! Listener event names.
//!
//! Listeners subscribe with a string of the form `<category>` or
//! `<category> <path>`, where the category is one of the change kinds or
//! `change` (any kind). Everything after the first space is the path, taken
//! verbatim and compared as a plain string. Every change event is emitted
//! under four names, in this order:
//!
//! 1. `<kind>`
//! 2. `<kind> <path>`
//! 3. `change`
//! 4. `change <path>`
//!
//! # Example
//!
//! ```
//! use observed::{Category, ChangeKind, EventSpec};
//!
//! let spec: EventSpec = "update nested.tags.length".parse().unwrap();
//! assert_eq!(spec.category, Category::Kind(ChangeKind::Update));
//! assert_eq!(spec.path.as_deref(), Some("nested.tags.length"));
//! assert_eq!(spec.to_string(), "update nested.tags.length");
//!
//! let spaced: EventSpec = "update first name".parse().unwrap();
//! assert_eq!(spaced.path.as_deref(), Some("first name"));
//!
//! assert!("rename name".parse::<EventSpec>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ObserveError;
use crate::event::{ChangeEvent, ChangeKind};

/// Category name matching every change kind.
pub const CHANGE: &str = "change";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Kind(ChangeKind),
    Change,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Kind(kind) => kind.as_str(),
            Category::Change => CHANGE,
        }
    }

    pub fn matches(self, kind: ChangeKind) -> bool {
        match self {
            Category::Kind(own) => own == kind,
            Category::Change => true,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ObserveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CHANGE {
            return Ok(Category::Change);
        }
        s.parse::<ChangeKind>()
            .map(Category::Kind)
            .map_err(|_| ObserveError::InvalidEventSpec(s.to_owned()))
    }
}

impl From<ChangeKind> for Category {
    fn from(kind: ChangeKind) -> Self {
        Category::Kind(kind)
    }
}

/// A parsed listener event name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSpec {
    pub category: Category,
    /// Restricts the spec to events at exactly this path.
    pub path: Option<String>,
}

impl EventSpec {
    pub fn new(category: impl Into<Category>) -> Self {
        Self {
            category: category.into(),
            path: None,
        }
    }

    /// Spec restricted to events at exactly `path`.
    ///
    /// Any string is accepted, including the empty path of a root-level empty
    /// key and paths with spaces.
    pub fn at(category: impl Into<Category>, path: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            path: Some(path.into()),
        }
    }

    /// Whether `event` is emitted under this spec's name; the same test the
    /// emitter performs by comparing names from [`fire_order`](Self::fire_order).
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        let at_path = match &self.path {
            Some(path) => *path == event.path,
            None => true,
        };
        self.category.matches(event.kind) && at_path
    }

    /// The names `event` is emitted under, in emission order.
    pub fn fire_order(event: &ChangeEvent) -> [String; 4] {
        let kind = event.kind.as_str();
        let path = &event.path;
        [
            kind.to_owned(),
            format!("{kind} {path}"),
            CHANGE.to_owned(),
            format!("{CHANGE} {path}"),
        ]
    }
}

impl fmt::Display for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}", self.category, path),
            None => write!(f, "{}", self.category),
        }
    }
}

impl FromStr for EventSpec {
    type Err = ObserveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, path) = match s.split_once(' ') {
            Some((category, path)) => (category, Some(path)),
            None => (s, None),
        };
        let category = category
            .parse::<Category>()
            .map_err(|_| ObserveError::InvalidEventSpec(s.to_owned()))?;
        Ok(match path {
            Some(path) => EventSpec::at(category, path),
            None => EventSpec::new(category),
        })
    }
}
