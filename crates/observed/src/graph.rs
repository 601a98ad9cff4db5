//! The registry of instrumented objects.
//!
//! Every container reachable from the observed root gets exactly one entry,
//! holding its dotted path, the slot it was discovered through and its
//! mutation subscription. Entries form a tree through their parent links: an
//! object reachable along several paths is registered under the first one
//! found, and cycles stop at objects that are already registered.

use std::cell::RefCell;

use indexmap::IndexMap;
use observed_heap::{
    Heap, HeapError, MutationCallback, MutationSource, ObjectId, Shape, SubscriptionId,
};
use observed_path::resolve;
use tracing::debug;

/// The slot an instrumented object was discovered through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParentLink {
    pub owner: ObjectId,
    pub key: String,
}

#[derive(Debug)]
struct Entry {
    path: String,
    parent: Option<ParentLink>,
    children: Vec<ObjectId>,
    subscription: SubscriptionId,
}

#[derive(Debug, Default)]
pub(crate) struct ObserverGraph {
    /// In attach order.
    entries: IndexMap<ObjectId, Entry>,
}

impl ObserverGraph {
    pub fn contains(&self, object: ObjectId) -> bool {
        self.entries.contains_key(&object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn path_of(&self, object: ObjectId) -> Option<&str> {
        self.entries.get(&object).map(|entry| entry.path.as_str())
    }

    /// `None` for the root and for objects that are not registered.
    pub fn parent_of(&self, object: ObjectId) -> Option<&ParentLink> {
        self.entries.get(&object)?.parent.as_ref()
    }

    pub fn observers(&self) -> Vec<ObjectId> {
        self.entries.keys().copied().collect()
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.entries.values().map(|entry| entry.subscription).collect()
    }

    pub fn insert(
        &mut self,
        object: ObjectId,
        path: String,
        parent: Option<ParentLink>,
        subscription: SubscriptionId,
    ) {
        if let Some(link) = &parent {
            if let Some(owner) = self.entries.get_mut(&link.owner) {
                owner.children.push(object);
            }
        }
        self.entries.insert(
            object,
            Entry {
                path,
                parent,
                children: Vec::new(),
                subscription,
            },
        );
    }

    /// Remove `object` and every registered descendant, returning their
    /// subscriptions.
    pub fn remove_subtree(&mut self, object: ObjectId) -> Vec<(ObjectId, SubscriptionId)> {
        let mut removed = Vec::new();
        let Some(entry) = self.entries.shift_remove(&object) else {
            return removed;
        };
        if let Some(link) = &entry.parent {
            if let Some(owner) = self.entries.get_mut(&link.owner) {
                owner.children.retain(|child| *child != object);
            }
        }
        let mut pending = vec![(object, entry)];
        while let Some((object, entry)) = pending.pop() {
            for child in &entry.children {
                if let Some(child_entry) = self.entries.shift_remove(child) {
                    pending.push((*child, child_entry));
                }
            }
            removed.push((object, entry.subscription));
        }
        removed
    }

    /// Move `object` to another slot of the same owner and recompute the
    /// paths of its subtree.
    pub fn rekey(&mut self, object: ObjectId, key: String) -> bool {
        let Some(owner) = self.parent_of(object).map(|link| link.owner) else {
            return false;
        };
        let Some(owner_path) = self.path_of(owner) else {
            return false;
        };
        let path = resolve(owner_path, key.as_str());
        if let Some(link) = self
            .entries
            .get_mut(&object)
            .and_then(|entry| entry.parent.as_mut())
        {
            link.key = key;
        }
        self.repath(object, path);
        true
    }

    fn repath(&mut self, object: ObjectId, path: String) {
        let mut pending = vec![(object, path)];
        while let Some((object, path)) = pending.pop() {
            let Some(entry) = self.entries.get_mut(&object) else {
                continue;
            };
            entry.path = path;
            let children = entry.children.clone();
            let parent_path = entry.path.clone();
            for child in children {
                let key = self
                    .entries
                    .get(&child)
                    .and_then(|entry| entry.parent.as_ref())
                    .map(|link| link.key.clone());
                if let Some(key) = key {
                    pending.push((child, resolve(&parent_path, key.as_str())));
                }
            }
        }
    }

    /// Drop every entry, returning the subscriptions to cancel.
    pub fn clear(&mut self) -> Vec<SubscriptionId> {
        std::mem::take(&mut self.entries)
            .into_values()
            .map(|entry| entry.subscription)
            .collect()
    }
}

/// Produces the mutation callback for a newly instrumented object.
pub(crate) trait Subscriber {
    fn callback(&self, object: ObjectId) -> MutationCallback;
}

/// Everything attach and detach need besides the registry itself.
///
/// No borrow of the registry is held while the heap is read, since reads may
/// run accessor getters.
pub(crate) struct GraphContext<'a> {
    pub heap: &'a Heap,
    pub source: &'a dyn MutationSource,
    pub graph: &'a RefCell<ObserverGraph>,
    pub subscriber: &'a dyn Subscriber,
}

impl GraphContext<'_> {
    /// Instrument `object` and every container reachable from it that is
    /// not instrumented yet, depth first. Returns how many objects were
    /// instrumented.
    ///
    /// Leaves and already instrumented objects are skipped.
    pub fn attach(
        &self,
        object: ObjectId,
        path: String,
        parent: Option<ParentLink>,
    ) -> Result<usize, HeapError> {
        let mut pending = vec![(object, path, parent)];
        let mut attached = 0;
        while let Some((object, path, parent)) = pending.pop() {
            if self.graph.borrow().contains(object)
                || !self.heap.shape_of(object).is_some_and(Shape::is_container)
            {
                continue;
            }
            let subscription = self
                .source
                .observe_mutations(object, self.subscriber.callback(object))?;
            debug!(%object, path = %path, "attached observer");
            self.graph
                .borrow_mut()
                .insert(object, path.clone(), parent, subscription);
            attached += 1;

            let children = self.heap.entries(object);
            // Reversed so the first property is visited first.
            for (key, value) in children.into_iter().rev() {
                if let Some(child) = value.as_object() {
                    let child_path = resolve(&path, key.as_str());
                    let link = ParentLink { owner: object, key };
                    pending.push((child, child_path, Some(link)));
                }
            }
        }
        Ok(attached)
    }

    /// Stop observing `object` and its registered descendants. Returns how
    /// many objects were released; unregistered objects release nothing.
    pub fn detach(&self, object: ObjectId) -> usize {
        let removed = self.graph.borrow_mut().remove_subtree(object);
        for (object, subscription) in &removed {
            self.source.unobserve_mutations(*subscription);
            debug!(%object, "detached observer");
        }
        removed.len()
    }

    pub fn rekey(&self, object: ObjectId, key: String) {
        let mut graph = self.graph.borrow_mut();
        if graph.rekey(object, key) {
            debug!(%object, path = graph.path_of(object).unwrap_or_default(), "moved observer");
        }
    }
}
