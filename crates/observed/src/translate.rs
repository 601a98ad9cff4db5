//! Turns raw mutation records into path-qualified change events and keeps
//! the observer graph in step with them.

use observed_heap::{Heap, ObjectId, RawRecord, Value};
use observed_path::resolve;
use tracing::{trace, warn};

use crate::event::{ChangeEvent, ChangeKind};
use crate::graph::{GraphContext, ParentLink};
use crate::options::ObserveOptions;

/// Translate one batch of records for `owner`.
///
/// The graph is adjusted record by record, so by the time the returned events
/// are dispatched every container they introduce is already observed and
/// every container they removed is already released. Records for an owner
/// that is no longer observed yield nothing.
pub(crate) fn translate(
    cx: &GraphContext<'_>,
    options: &ObserveOptions,
    owner: ObjectId,
    records: &[RawRecord],
) -> Vec<ChangeEvent> {
    let owner_path = cx.graph.borrow().path_of(owner).map(str::to_owned);
    let Some(owner_path) = owner_path else {
        trace!(%owner, dropped = records.len(), "records for released object");
        return Vec::new();
    };
    records
        .iter()
        .map(|record| {
            let event = ChangeEvent {
                kind: record.kind,
                name: record.name.clone(),
                path: resolve(&owner_path, record.name.as_str()),
                object: record.object,
                value: cx.heap.get(record.object, &record.name),
                old_value: record.old_value.clone(),
            };
            adjust(cx, options, &event);
            event
        })
        .collect()
}

fn adjust(cx: &GraphContext<'_>, options: &ObserveOptions, event: &ChangeEvent) {
    if let Some(child) = event.value.as_ref().and_then(Value::as_object) {
        adopt(cx, event, child);
    }
    let releases = event.kind == ChangeKind::Delete
        || (options.detach_replaced && event.kind != ChangeKind::Add);
    if releases {
        if let Some(old) = event.old_value.as_ref().and_then(Value::as_object) {
            release(cx, event.object, &event.name, old);
        }
    }
}

/// Observe a container that just appeared in a slot of `event.object`, or
/// follow it when it moved there from another slot of the same owner.
fn adopt(cx: &GraphContext<'_>, event: &ChangeEvent, child: ObjectId) {
    let state = {
        let graph = cx.graph.borrow();
        graph
            .contains(child)
            .then(|| graph.parent_of(child).cloned())
    };
    match state {
        None => {
            let link = ParentLink {
                owner: event.object,
                key: event.name.clone(),
            };
            if let Err(err) = cx.attach(child, event.path.clone(), Some(link)) {
                warn!(object = %child, path = %event.path, %err, "failed to observe new value");
            }
        }
        Some(Some(link))
            if link.owner == event.object
                && link.key != event.name
                && !holds(cx.heap, link.owner, &link.key, child) =>
        {
            cx.rekey(child, event.name.clone());
        }
        // Aliases stay on their first path.
        Some(_) => {}
    }
}

/// Stop observing a container that left the slot it was registered through,
/// unless the owner still holds it in another slot.
fn release(cx: &GraphContext<'_>, owner: ObjectId, name: &str, old: ObjectId) {
    let registered_here = cx
        .graph
        .borrow()
        .parent_of(old)
        .is_some_and(|link| link.owner == owner && link.key == name);
    if !registered_here || holds(cx.heap, owner, name, old) {
        return;
    }
    match slot_of(cx.heap, owner, old) {
        Some(key) => cx.rekey(old, key),
        None => {
            cx.detach(old);
        }
    }
}

fn holds(heap: &Heap, owner: ObjectId, key: &str, target: ObjectId) -> bool {
    heap.get(owner, key).and_then(|value| value.as_object()) == Some(target)
}

fn slot_of(heap: &Heap, owner: ObjectId, target: ObjectId) -> Option<String> {
    heap.entries(owner)
        .into_iter()
        .find(|(_, value)| value.as_object() == Some(target))
        .map(|(key, _)| key)
}
