use observed_heap::HeapError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserveError {
    #[error("invalid event spec `{0}`")]
    InvalidEventSpec(String),
    #[error(transparent)]
    Heap(#[from] HeapError),
}
