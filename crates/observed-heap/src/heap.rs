//! The object arena and its mutation feed.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use indexmap::IndexMap;
use observed_path::as_index;
use tracing::{debug, trace};

use crate::container::{Container, Getter, Property};
use crate::error::HeapError;
use crate::options::{DeliveryMode, HeapOptions};
use crate::record::{RawRecord, RecordKind};
use crate::source::{MutationCallback, MutationSource, SubscriptionId};
use crate::value::{ObjectId, Shape, Value};

/// Name of the virtual length property of ordered collections.
pub const LENGTH: &str = "length";

/// Largest length an ordered collection may reach; the highest index is one
/// less.
pub const MAX_LENGTH: usize = u32::MAX as usize;

/// Shared handle to an object arena.
///
/// Cloning is cheap and every clone addresses the same arena. All mutation goes
/// through methods on this type; each one enqueues [`RawRecord`]s for the
/// mutated object's subscribers. No internal borrow is held while callbacks or
/// getters run, so they are free to read and mutate the heap re-entrantly.
///
/// Containers are never freed: an [`ObjectId`] stays valid, and its container
/// readable, for as long as any clone of the heap is alive, even after nothing
/// refers to it. Ids are not reused. Memory is reclaimed only when the last
/// clone is dropped, so long-running programs that churn through containers
/// should start a fresh heap periodically.
#[derive(Clone, Default)]
pub struct Heap {
    inner: Rc<RefCell<HeapInner>>,
}

#[derive(Default)]
struct HeapInner {
    options: HeapOptions,
    objects: Vec<Container>,
    next_subscription: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    by_object: HashMap<ObjectId, Vec<SubscriptionId>>,
    /// Subscriptions with pending records, in the order they first got one.
    pending_order: VecDeque<SubscriptionId>,
    delivering: bool,
}

struct Subscription {
    object: ObjectId,
    callback: MutationCallback,
    pending: Vec<RawRecord>,
}

/// Property value as captured under the borrow; getters run after release.
enum Slot {
    Value(Value),
    Getter(Getter),
}

impl Slot {
    fn resolve(self) -> Value {
        match self {
            Slot::Value(value) => value,
            Slot::Getter(getter) => getter(),
        }
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: HeapOptions) -> Self {
        let heap = Self::default();
        heap.inner.borrow_mut().options = options;
        heap
    }

    pub fn options(&self) -> HeapOptions {
        self.inner.borrow().options.clone()
    }

    /// Allocate an empty record.
    pub fn record(&self) -> ObjectId {
        self.inner
            .borrow_mut()
            .alloc(Container::Record(IndexMap::new()))
    }

    /// Allocate an empty ordered collection.
    pub fn ordered(&self) -> ObjectId {
        self.inner.borrow_mut().alloc(Container::Ordered(Vec::new()))
    }

    // ── Reads ─────────────────────────────────────────────────────────────

    /// Shape of a value; unknown object ids are treated as leaves.
    pub fn shape(&self, value: &Value) -> Shape {
        match value {
            Value::Object(id) => self.shape_of(*id).unwrap_or(Shape::Leaf),
            _ => Shape::Leaf,
        }
    }

    pub fn shape_of(&self, object: ObjectId) -> Option<Shape> {
        self.inner
            .borrow()
            .objects
            .get(object.index())
            .map(Container::shape)
    }

    /// Current value of a property; accessors are evaluated.
    ///
    /// Ordered collections answer numeric names and `length`.
    pub fn get(&self, object: ObjectId, name: &str) -> Option<Value> {
        let slot = {
            let inner = self.inner.borrow();
            match inner.objects.get(object.index())? {
                Container::Record(props) => match props.get(name)? {
                    Property::Data(value) => Slot::Value(value.clone()),
                    Property::Accessor(getter) => Slot::Getter(Rc::clone(getter)),
                },
                Container::Ordered(items) => {
                    if name == LENGTH {
                        Slot::Value(Value::from(items.len()))
                    } else {
                        Slot::Value(items.get(as_index(name)?)?.clone()?)
                    }
                }
            }
        };
        Some(slot.resolve())
    }

    pub fn get_index(&self, object: ObjectId, index: usize) -> Option<Value> {
        match self.inner.borrow().objects.get(object.index())? {
            Container::Ordered(items) => items.get(index)?.clone(),
            Container::Record(_) => None,
        }
    }

    pub fn has(&self, object: ObjectId, name: &str) -> bool {
        let inner = self.inner.borrow();
        match inner.objects.get(object.index()) {
            Some(Container::Record(props)) => props.contains_key(name),
            Some(Container::Ordered(items)) => {
                name == LENGTH
                    || as_index(name).is_some_and(|i| items.get(i).is_some_and(Option::is_some))
            }
            None => false,
        }
    }

    /// Own enumerable property names: record keys in insertion order, or the
    /// indices of present collection elements.
    pub fn keys(&self, object: ObjectId) -> Vec<String> {
        let inner = self.inner.borrow();
        match inner.objects.get(object.index()) {
            Some(Container::Record(props)) => props.keys().cloned().collect(),
            Some(Container::Ordered(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(i, _)| i.to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Own enumerable properties with their current values.
    pub fn entries(&self, object: ObjectId) -> Vec<(String, Value)> {
        let slots: Vec<(String, Slot)> = {
            let inner = self.inner.borrow();
            match inner.objects.get(object.index()) {
                Some(Container::Record(props)) => props
                    .iter()
                    .map(|(name, prop)| {
                        let slot = match prop {
                            Property::Data(value) => Slot::Value(value.clone()),
                            Property::Accessor(getter) => Slot::Getter(Rc::clone(getter)),
                        };
                        (name.clone(), slot)
                    })
                    .collect(),
                Some(Container::Ordered(items)) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, slot)| {
                        slot.as_ref()
                            .map(|value| (i.to_string(), Slot::Value(value.clone())))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        slots
            .into_iter()
            .map(|(name, slot)| (name, slot.resolve()))
            .collect()
    }

    /// Number of record properties, or the length of an ordered collection.
    pub fn len(&self, object: ObjectId) -> Option<usize> {
        match self.inner.borrow().objects.get(object.index())? {
            Container::Record(props) => Some(props.len()),
            Container::Ordered(items) => Some(items.len()),
        }
    }

    /// Whether any data slot of `owner` currently holds `target`.
    pub fn contains_object(&self, owner: ObjectId, target: ObjectId) -> bool {
        self.inner
            .borrow()
            .objects
            .get(owner.index())
            .is_some_and(|c| c.holds(&Value::Object(target)))
    }

    // ── Record mutation ───────────────────────────────────────────────────

    /// Assign a property.
    ///
    /// On records this adds or updates a data property; assigning an equal
    /// value records nothing. On ordered collections `name` must be an index or
    /// `length`.
    pub fn set(
        &self,
        object: ObjectId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), HeapError> {
        self.mutate(|inner| inner.set(object, name, value.into()))
    }

    /// Remove a property, returning its previous data value.
    ///
    /// Removing an absent property is a no-op and records nothing. Deleting a
    /// collection element leaves a hole; the length is unchanged.
    pub fn delete(&self, object: ObjectId, name: &str) -> Result<Option<Value>, HeapError> {
        self.mutate(|inner| inner.delete(object, name))
    }

    /// Redefine a record property as a getter-backed accessor.
    pub fn define_getter<F>(&self, object: ObjectId, name: &str, getter: F) -> Result<(), HeapError>
    where
        F: Fn() -> Value + 'static,
    {
        let getter: Getter = Rc::new(getter);
        self.mutate(|inner| inner.define(object, name, Property::Accessor(getter)))
    }

    /// Define a record property as a plain data property, replacing an
    /// accessor if there is one.
    pub fn define_value(
        &self,
        object: ObjectId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), HeapError> {
        let value = value.into();
        self.mutate(|inner| inner.define(object, name, Property::Data(value)))
    }

    // ── Ordered mutation ──────────────────────────────────────────────────

    /// Append an element, returning the new length.
    pub fn push(&self, object: ObjectId, value: impl Into<Value>) -> Result<usize, HeapError> {
        let value = value.into();
        self.mutate(|inner| {
            let index = inner.ordered(object)?.len();
            inner.set_index(object, index, value)?;
            Ok(index + 1)
        })
    }

    pub fn pop(&self, object: ObjectId) -> Result<Option<Value>, HeapError> {
        self.mutate(|inner| {
            let len = inner.ordered(object)?.len();
            if len == 0 {
                return Ok(None);
            }
            inner.remove(object, len - 1)
        })
    }

    /// Write an element. Writing past the end grows the collection, leaving
    /// holes between the old end and `index`.
    pub fn set_index(
        &self,
        object: ObjectId,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), HeapError> {
        let value = value.into();
        self.mutate(|inner| inner.set_index(object, index, value))
    }

    /// Insert an element, shifting later elements up by one.
    pub fn insert(
        &self,
        object: ObjectId,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), HeapError> {
        let value = value.into();
        self.mutate(|inner| inner.insert(object, index, value))
    }

    /// Remove an element, shifting later elements down by one.
    pub fn remove(&self, object: ObjectId, index: usize) -> Result<Option<Value>, HeapError> {
        self.mutate(|inner| inner.remove(object, index))
    }

    /// Set the collection length, dropping or padding elements at the end.
    pub fn truncate(&self, object: ObjectId, len: usize) -> Result<(), HeapError> {
        self.mutate(|inner| inner.set_len(object, len))
    }

    // ── Delivery ──────────────────────────────────────────────────────────

    /// Deliver every pending batch, including batches queued by the callbacks
    /// themselves, and return how many were delivered.
    ///
    /// Re-entrant calls return `0` immediately; the outer call picks up
    /// anything queued meanwhile.
    pub fn settle(&self) -> usize {
        let Some(_guard) = DeliveryGuard::enter(&self.inner) else {
            return 0;
        };
        let mut delivered = 0;
        loop {
            let batch = self.inner.borrow_mut().next_batch();
            let Some((callback, records)) = batch else {
                break;
            };
            callback(records.as_slice());
            delivered += 1;
        }
        if delivered > 0 {
            debug!(batches = delivered, "heap settled");
        }
        delivered
    }

    /// Total number of records waiting for delivery.
    pub fn pending_records(&self) -> usize {
        self.inner
            .borrow()
            .subscriptions
            .values()
            .map(|sub| sub.pending.len())
            .sum()
    }

    /// Number of active `observe_mutations` registrations.
    pub fn subscription_count(&self) -> usize {
        self.inner.borrow().subscriptions.len()
    }

    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut HeapInner) -> Result<T, HeapError>,
    ) -> Result<T, HeapError> {
        let (out, immediate) = {
            let mut inner = self.inner.borrow_mut();
            let out = op(&mut *inner)?;
            (out, inner.options.delivery == DeliveryMode::Immediate)
        };
        if immediate {
            self.settle();
        }
        Ok(out)
    }

    pub(crate) fn alloc_json(&self, json: &serde_json::Value) -> Value {
        self.inner.borrow_mut().alloc_json(json)
    }
}

impl MutationSource for Heap {
    fn observe_mutations(
        &self,
        object: ObjectId,
        callback: MutationCallback,
    ) -> Result<SubscriptionId, HeapError> {
        let mut inner = self.inner.borrow_mut();
        inner.container(object)?;
        inner.next_subscription += 1;
        let id = SubscriptionId::new(inner.next_subscription);
        inner.subscriptions.insert(
            id,
            Subscription {
                object,
                callback,
                pending: Vec::new(),
            },
        );
        inner.by_object.entry(object).or_default().push(id);
        debug!(%object, subscription = id.get(), "observing mutations");
        Ok(id)
    }

    fn unobserve_mutations(&self, subscription: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(sub) = inner.subscriptions.remove(&subscription) else {
            return false;
        };
        if let Some(ids) = inner.by_object.get_mut(&sub.object) {
            ids.retain(|id| *id != subscription);
            if ids.is_empty() {
                inner.by_object.remove(&sub.object);
            }
        }
        if !sub.pending.is_empty() {
            inner.pending_order.retain(|id| *id != subscription);
        }
        debug!(
            object = %sub.object,
            subscription = subscription.get(),
            dropped = sub.pending.len(),
            "stopped observing mutations"
        );
        true
    }

    fn deliver(&self, subscription: SubscriptionId) -> bool {
        let batch = self.inner.borrow_mut().take_batch(subscription);
        match batch {
            Some((callback, records)) => {
                callback(records.as_slice());
                true
            }
            None => false,
        }
    }
}

/// Marks a settle loop in progress; cleared on drop, including on unwind.
struct DeliveryGuard<'a> {
    inner: &'a RefCell<HeapInner>,
}

impl<'a> DeliveryGuard<'a> {
    fn enter(inner: &'a RefCell<HeapInner>) -> Option<Self> {
        let mut state = inner.borrow_mut();
        if state.delivering {
            return None;
        }
        state.delivering = true;
        Some(Self { inner })
    }
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.inner.borrow_mut().delivering = false;
    }
}

/// Pad `items` with holes up to `len`, failing instead of aborting when the
/// length is over [`MAX_LENGTH`] or cannot be allocated.
fn grow(items: &mut Vec<Option<Value>>, len: usize) -> Result<(), HeapError> {
    if len > MAX_LENGTH {
        return Err(HeapError::InvalidLength);
    }
    items
        .try_reserve_exact(len.saturating_sub(items.len()))
        .map_err(|_| HeapError::InvalidLength)?;
    items.resize(len, None);
    Ok(())
}

fn slot_record(
    object: ObjectId,
    index: usize,
    old: Option<&Value>,
    new: Option<&Value>,
) -> Option<RawRecord> {
    let kind = match (old, new) {
        (None, Some(_)) => RecordKind::Add,
        (Some(_), None) => RecordKind::Delete,
        (Some(old), Some(new)) if old != new => RecordKind::Update,
        _ => return None,
    };
    Some(RawRecord::new(kind, object, index.to_string(), old.cloned()))
}

fn length_record(object: ObjectId, old_len: usize, new_len: usize) -> Option<RawRecord> {
    (old_len != new_len).then(|| {
        RawRecord::new(
            RecordKind::Update,
            object,
            LENGTH,
            Some(Value::from(old_len)),
        )
    })
}

impl HeapInner {
    fn alloc(&mut self, container: Container) -> ObjectId {
        let id = ObjectId::from_index(self.objects.len());
        self.objects.push(container);
        id
    }

    fn alloc_json(&mut self, json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                let items = items.iter().map(|item| Some(self.alloc_json(item))).collect();
                Value::Object(self.alloc(Container::Ordered(items)))
            }
            serde_json::Value::Object(map) => {
                let props = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Property::Data(self.alloc_json(v))))
                    .collect();
                Value::Object(self.alloc(Container::Record(props)))
            }
        }
    }

    fn container(&self, object: ObjectId) -> Result<&Container, HeapError> {
        self.objects
            .get(object.index())
            .ok_or(HeapError::UnknownObject(object))
    }

    fn container_mut(&mut self, object: ObjectId) -> Result<&mut Container, HeapError> {
        self.objects
            .get_mut(object.index())
            .ok_or(HeapError::UnknownObject(object))
    }

    fn props_mut(&mut self, object: ObjectId) -> Result<&mut IndexMap<String, Property>, HeapError> {
        match self.container_mut(object)? {
            Container::Record(props) => Ok(props),
            Container::Ordered(_) => Err(HeapError::NotRecord(object)),
        }
    }

    fn ordered(&self, object: ObjectId) -> Result<&Vec<Option<Value>>, HeapError> {
        match self.container(object)? {
            Container::Ordered(items) => Ok(items),
            Container::Record(_) => Err(HeapError::NotOrdered(object)),
        }
    }

    fn ordered_mut(&mut self, object: ObjectId) -> Result<&mut Vec<Option<Value>>, HeapError> {
        match self.container_mut(object)? {
            Container::Ordered(items) => Ok(items),
            Container::Record(_) => Err(HeapError::NotOrdered(object)),
        }
    }

    fn enqueue(&mut self, record: RawRecord) {
        let Some(ids) = self.by_object.get(&record.object) else {
            return;
        };
        trace!(
            object = %record.object,
            kind = %record.kind,
            name = %record.name,
            "queued mutation record"
        );
        for id in ids {
            if let Some(sub) = self.subscriptions.get_mut(id) {
                if sub.pending.is_empty() {
                    self.pending_order.push_back(*id);
                }
                sub.pending.push(record.clone());
            }
        }
    }

    fn enqueue_all(&mut self, records: impl IntoIterator<Item = RawRecord>) {
        for record in records {
            self.enqueue(record);
        }
    }

    fn next_batch(&mut self) -> Option<(MutationCallback, Vec<RawRecord>)> {
        while let Some(id) = self.pending_order.pop_front() {
            if let Some(sub) = self.subscriptions.get_mut(&id) {
                if !sub.pending.is_empty() {
                    return Some((Rc::clone(&sub.callback), std::mem::take(&mut sub.pending)));
                }
            }
        }
        None
    }

    fn take_batch(
        &mut self,
        subscription: SubscriptionId,
    ) -> Option<(MutationCallback, Vec<RawRecord>)> {
        let sub = self.subscriptions.get_mut(&subscription)?;
        if sub.pending.is_empty() {
            return None;
        }
        let batch = (Rc::clone(&sub.callback), std::mem::take(&mut sub.pending));
        self.pending_order.retain(|id| *id != subscription);
        Some(batch)
    }

    fn set(&mut self, object: ObjectId, name: &str, value: Value) -> Result<(), HeapError> {
        if self.container(object)?.shape() == Shape::Ordered {
            if name == LENGTH {
                let len = value
                    .as_u64()
                    .and_then(|len| usize::try_from(len).ok())
                    .ok_or(HeapError::InvalidLength)?;
                return self.set_len(object, len);
            }
            let index = as_index(name).ok_or_else(|| HeapError::InvalidIndex(name.to_owned()))?;
            return self.set_index(object, index, value);
        }
        let props = self.props_mut(object)?;
        let record = match props.get_mut(name) {
            Some(Property::Data(current)) => {
                if *current == value {
                    return Ok(());
                }
                let old = std::mem::replace(current, value);
                RawRecord::new(RecordKind::Update, object, name, Some(old))
            }
            Some(Property::Accessor(_)) => return Err(HeapError::ReadOnly(name.to_owned())),
            None => {
                props.insert(name.to_owned(), Property::Data(value));
                RawRecord::new(RecordKind::Add, object, name, None)
            }
        };
        self.enqueue(record);
        Ok(())
    }

    fn delete(&mut self, object: ObjectId, name: &str) -> Result<Option<Value>, HeapError> {
        if self.container(object)?.shape() == Shape::Ordered {
            if name == LENGTH {
                return Err(HeapError::ReadOnly(LENGTH.to_owned()));
            }
            let Some(index) = as_index(name) else {
                return Ok(None);
            };
            let items = self.ordered_mut(object)?;
            let Some(old) = items.get_mut(index).and_then(Option::take) else {
                return Ok(None);
            };
            self.enqueue(RawRecord::new(
                RecordKind::Delete,
                object,
                name,
                Some(old.clone()),
            ));
            return Ok(Some(old));
        }
        let old = match self.props_mut(object)?.shift_remove(name) {
            Some(Property::Data(old)) => Some(old),
            Some(Property::Accessor(_)) => None,
            None => return Ok(None),
        };
        self.enqueue(RawRecord::new(
            RecordKind::Delete,
            object,
            name,
            old.clone(),
        ));
        Ok(old)
    }

    fn define(&mut self, object: ObjectId, name: &str, property: Property) -> Result<(), HeapError> {
        let props = self.props_mut(object)?;
        let record = match (props.get(name), &property) {
            (None, _) => RawRecord::new(RecordKind::Add, object, name, None),
            (Some(Property::Data(old)), Property::Data(new)) => {
                if old == new {
                    return Ok(());
                }
                RawRecord::new(RecordKind::Update, object, name, Some(old.clone()))
            }
            (Some(Property::Data(old)), Property::Accessor(_)) => {
                RawRecord::new(RecordKind::Reconfigure, object, name, Some(old.clone()))
            }
            (Some(Property::Accessor(_)), _) => {
                RawRecord::new(RecordKind::Reconfigure, object, name, None)
            }
        };
        props.insert(name.to_owned(), property);
        self.enqueue(record);
        Ok(())
    }

    fn set_index(&mut self, object: ObjectId, index: usize, value: Value) -> Result<(), HeapError> {
        let grown = index
            .checked_add(1)
            .filter(|len| *len <= MAX_LENGTH)
            .ok_or_else(|| HeapError::InvalidIndex(index.to_string()))?;
        let items = self.ordered_mut(object)?;
        let old_len = items.len();
        if index >= old_len {
            grow(items, grown)?;
        }
        let old = items[index].replace(value.clone());
        let new_len = items.len();
        let records = [
            slot_record(object, index, old.as_ref(), Some(&value)),
            length_record(object, old_len, new_len),
        ];
        self.enqueue_all(records.into_iter().flatten());
        Ok(())
    }

    fn insert(&mut self, object: ObjectId, index: usize, value: Value) -> Result<(), HeapError> {
        let items = self.ordered_mut(object)?;
        let old_len = items.len();
        if index > old_len {
            return Err(HeapError::IndexOutOfBounds {
                index,
                len: old_len,
            });
        }
        if old_len >= MAX_LENGTH {
            return Err(HeapError::InvalidLength);
        }
        let before = items[index..].to_vec();
        items.insert(index, Some(value));
        let after = items[index..].to_vec();
        // Elements shift up from the end, so slots are reported top-down.
        let mut records: Vec<RawRecord> = (index..=old_len)
            .rev()
            .filter_map(|i| {
                let offset = i - index;
                slot_record(
                    object,
                    i,
                    before.get(offset).and_then(Option::as_ref),
                    after.get(offset).and_then(Option::as_ref),
                )
            })
            .collect();
        records.extend(length_record(object, old_len, old_len + 1));
        self.enqueue_all(records);
        Ok(())
    }

    fn remove(&mut self, object: ObjectId, index: usize) -> Result<Option<Value>, HeapError> {
        let items = self.ordered_mut(object)?;
        let old_len = items.len();
        if index >= old_len {
            return Err(HeapError::IndexOutOfBounds {
                index,
                len: old_len,
            });
        }
        let before = items[index..].to_vec();
        let removed = items.remove(index);
        let after = items[index..].to_vec();
        let mut records: Vec<RawRecord> = (index..old_len)
            .filter_map(|i| {
                let offset = i - index;
                slot_record(
                    object,
                    i,
                    before.get(offset).and_then(Option::as_ref),
                    after.get(offset).and_then(Option::as_ref),
                )
            })
            .collect();
        records.extend(length_record(object, old_len, old_len - 1));
        self.enqueue_all(records);
        Ok(removed)
    }

    fn set_len(&mut self, object: ObjectId, len: usize) -> Result<(), HeapError> {
        let items = self.ordered_mut(object)?;
        let old_len = items.len();
        let mut records = Vec::new();
        if len < old_len {
            let tail = items.split_off(len);
            for (offset, slot) in tail.into_iter().enumerate().rev() {
                records.extend(slot_record(object, len + offset, slot.as_ref(), None));
            }
        } else {
            grow(items, len)?;
        }
        records.extend(length_record(object, old_len, len));
        self.enqueue_all(records);
        Ok(())
    }
}
