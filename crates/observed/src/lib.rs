//! Deep, path-qualified change events for nested records and ordered
//! collections.
//!
//! [`observe`] instruments a root container and every container reachable
//! from it. Each property change at any depth is reported as a
//! [`ChangeEvent`] carrying the dotted path from the root, the new and old
//! values and the object that changed. Containers that become reachable are
//! observed as they appear; containers that are removed are released.
//!
//! Changes are recorded by the [`Heap`] and delivered in batches: call
//! [`Observed::deliver_changes`] (or [`Heap::settle`]) to flush them, or build
//! the heap with [`DeliveryMode::Immediate`] to deliver after every mutation.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use observed::{observe, Heap, Value};
//! use serde_json::json;
//!
//! let heap = Heap::new();
//! let root = heap.import_json(&json!({
//!     "nested": {"tags": ["logic audio", "native instruments", "drums"]}
//! }));
//! let handle = observe(&heap, root.clone()).unwrap();
//!
//! let lengths = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&lengths);
//! handle
//!     .on("update nested.tags.length", move |change| {
//!         sink.borrow_mut()
//!             .push((change.old_value.clone(), change.value.clone()));
//!     })
//!     .unwrap();
//!
//! let nested = heap.get(root.as_object().unwrap(), "nested").unwrap();
//! let tags = heap.get(nested.as_object().unwrap(), "tags").unwrap();
//! heap.push(tags.as_object().unwrap(), "cajon").unwrap();
//! handle.deliver_changes();
//!
//! assert_eq!(
//!     *lengths.borrow(),
//!     vec![(Some(Value::from(3usize)), Some(Value::from(4usize)))]
//! );
//! ```

mod emitter;
mod error;
mod event;
mod event_spec;
mod graph;
mod handle;
mod options;
mod translate;

pub use emitter::ListenerId;
pub use error::ObserveError;
pub use event::{ChangeEvent, ChangeKind};
pub use event_spec::{Category, EventSpec, CHANGE};
pub use handle::{observe, Observed};
pub use options::ObserveOptions;

pub use observed_heap::{
    DeliveryMode, Heap, HeapError, HeapOptions, MutationCallback, MutationSource, ObjectId,
    RawRecord, Shape, SubscriptionId, Value,
};
