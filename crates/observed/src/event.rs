//! Semantic change events.

use observed_heap::{ObjectId, Value};

/// Kind of a semantic change; the same four kinds as raw mutation records.
pub use observed_heap::RecordKind as ChangeKind;

/// One property change anywhere in an observed graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Property name or collection index on the changed object.
    pub name: String,
    /// Dotted path from the observed root to the property.
    pub path: String,
    /// The object whose own property changed.
    pub object: ObjectId,
    /// Value read when the event was built; `None` when the property is gone.
    pub value: Option<Value>,
    pub old_value: Option<Value>,
}
