//! Raw mutation records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{ObjectId, Value};

/// What happened to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A property (or collection slot) came into existence.
    Add,
    /// A data property was assigned a different value.
    Update,
    /// A property was removed.
    Delete,
    /// A property was redefined between data and accessor form.
    Reconfigure,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Add,
        RecordKind::Update,
        RecordKind::Delete,
        RecordKind::Reconfigure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Add => "add",
            RecordKind::Update => "update",
            RecordKind::Delete => "delete",
            RecordKind::Reconfigure => "reconfigure",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown record kind `{0}`")]
pub struct ParseRecordKindError(pub String);

impl FromStr for RecordKind {
    type Err = ParseRecordKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseRecordKindError(s.to_owned()))
    }
}

/// One low-level property change on one object.
///
/// Records carry the previous value only; the current value is read from the
/// object when the record is consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub name: String,
    pub object: ObjectId,
    pub old_value: Option<Value>,
}

impl RawRecord {
    pub fn new(
        kind: RecordKind,
        object: ObjectId,
        name: impl Into<String>,
        old_value: Option<Value>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            object,
            old_value,
        }
    }
}
