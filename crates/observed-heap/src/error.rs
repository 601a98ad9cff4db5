use thiserror::Error;

use crate::value::ObjectId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
    #[error("object {0} is not a record")]
    NotRecord(ObjectId),
    #[error("object {0} is not an ordered collection")]
    NotOrdered(ObjectId),
    #[error("property `{0}` is read-only")]
    ReadOnly(String),
    #[error("`{0}` is not a valid collection index")]
    InvalidIndex(String),
    #[error("invalid collection length")]
    InvalidLength,
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}
