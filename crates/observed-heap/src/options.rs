//! Heap configuration.

use serde::{Deserialize, Serialize};

/// When queued mutation records reach their subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Records wait until [`Heap::settle`](crate::Heap::settle) or an explicit
    /// per-subscription delivery.
    #[default]
    Deferred,
    /// Records are delivered as soon as the mutating call returns.
    Immediate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapOptions {
    pub delivery: DeliveryMode,
}

impl HeapOptions {
    pub fn immediate() -> Self {
        Self {
            delivery: DeliveryMode::Immediate,
        }
    }
}
