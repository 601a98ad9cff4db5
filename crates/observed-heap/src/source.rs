//! The mutation source seam.
//!
//! A mutation source notifies subscribers about changes to one object's own
//! properties, batching raw records until a settle point. [`Heap`](crate::Heap)
//! is the portable implementation: every mutation goes through its setters, so
//! it can record exactly what changed. Hosts with another way of detecting
//! changes (polling and diffing, say) implement this trait themselves.

use std::rc::Rc;

use crate::error::HeapError;
use crate::record::RawRecord;
use crate::value::ObjectId;

/// Callback receiving one batch of records for one object, in arrival order.
pub type MutationCallback = Rc<dyn Fn(&[RawRecord])>;

/// Handle for one `observe_mutations` registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

pub trait MutationSource {
    /// Start receiving records for changes to `object`'s own properties.
    fn observe_mutations(
        &self,
        object: ObjectId,
        callback: MutationCallback,
    ) -> Result<SubscriptionId, HeapError>;

    /// Stop a subscription and drop its undelivered records.
    ///
    /// Returns `false` when the subscription was not active.
    fn unobserve_mutations(&self, subscription: SubscriptionId) -> bool;

    /// Deliver the subscription's pending records now, if there are any.
    ///
    /// Returns `true` when a batch was delivered.
    fn deliver(&self, subscription: SubscriptionId) -> bool;
}
