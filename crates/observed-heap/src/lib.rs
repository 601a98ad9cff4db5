//! Object graph arena with per-object mutation records.
//!
//! [`Heap`] stores records (named properties, optionally getter-backed) and
//! ordered collections (indexed elements plus a virtual `length`), addressed
//! by stable [`ObjectId`]s. Every mutation goes through the heap, which turns
//! it into [`RawRecord`]s (`add`, `update`, `delete`, `reconfigure`) queued for
//! the mutated object's subscribers and delivered in batches at settle points.
//! That makes the heap the portable [`MutationSource`] consumed by `observed`.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use observed_heap::{Heap, MutationSource, RawRecord, RecordKind};
//!
//! let heap = Heap::new();
//! let tags = heap.ordered();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! heap.observe_mutations(
//!     tags,
//!     Rc::new(move |records: &[RawRecord]| {
//!         sink.borrow_mut()
//!             .extend(records.iter().map(|r| (r.kind, r.name.clone())));
//!     }),
//! )
//! .unwrap();
//!
//! heap.push(tags, "cajon").unwrap();
//! heap.settle();
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![
//!         (RecordKind::Add, "0".to_string()),
//!         (RecordKind::Update, "length".to_string()),
//!     ]
//! );
//! ```

mod container;
mod error;
mod heap;
mod json;
mod options;
mod record;
mod source;
mod value;

pub use container::Getter;
pub use error::HeapError;
pub use heap::{Heap, LENGTH, MAX_LENGTH};
pub use options::{DeliveryMode, HeapOptions};
pub use record::{ParseRecordKindError, RawRecord, RecordKind};
pub use source::{MutationCallback, MutationSource, SubscriptionId};
pub use value::{ObjectId, Shape, Value};
