use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    /// Stop observing a nested container once an update replaces it and its
    /// owner no longer holds it anywhere.
    pub detach_replaced: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            detach_replaced: true,
        }
    }
}
