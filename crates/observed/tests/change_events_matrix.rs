use std::cell::{Cell, RefCell};
use std::rc::Rc;

use observed::{
    observe, ChangeEvent, ChangeKind, Heap, HeapOptions, ObjectId, Observed, Shape, Value,
};
use serde_json::json;

type Log = Rc<RefCell<Vec<ChangeEvent>>>;

fn record(handle: &Observed, spec: &str) -> Log {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    handle
        .on(spec, move |change| sink.borrow_mut().push(change.clone()))
        .unwrap();
    log
}

fn child(heap: &Heap, owner: ObjectId, name: &str) -> ObjectId {
    heap.get(owner, name)
        .and_then(|value| value.as_object())
        .unwrap_or_else(|| panic!("{name} is not an object"))
}

fn observed_json(heap: &Heap, doc: serde_json::Value) -> (ObjectId, Observed) {
    let root = heap.import_json(&doc);
    let handle = observe(heap, root.clone()).unwrap();
    (root.as_object().unwrap(), handle)
}

#[test]
fn emits_add_events() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let adds = record(&handle, "add");

    heap.set(o, "name", "observed").unwrap();
    handle.deliver_changes();

    let adds = adds.borrow();
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].path, "name");
    assert_eq!(adds[0].value, Some(Value::from("observed")));
    assert_eq!(adds[0].old_value, None);
    assert_eq!(adds[0].object, o);
}

#[test]
fn emits_update_events() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let updates = record(&handle, "update");

    heap.set(o, "name", "first").unwrap();
    heap.set(o, "name", "second").unwrap();
    handle.deliver_changes();

    let updates = updates.borrow();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].path, "name");
    assert_eq!(updates[0].value, Some(Value::from("second")));
    assert_eq!(updates[0].old_value, Some(Value::from("first")));
    assert_eq!(updates[0].value, heap.get(updates[0].object, "name"));
}

#[test]
fn emits_path_scoped_update_events() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let updates = record(&handle, "update name");

    heap.set(o, "name", "first").unwrap();
    heap.set(o, "name", "second").unwrap();
    heap.set(o, "other", 1).unwrap();
    heap.set(o, "other", 2).unwrap();
    handle.deliver_changes();

    let updates = updates.borrow();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].value, Some(Value::from("second")));
}

#[test]
fn emits_reconfigure_events_with_getter_value() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let reconfigures = record(&handle, "reconfigure");

    heap.set(o, "name", "first").unwrap();
    heap.define_getter(o, "name", || Value::from("second")).unwrap();
    handle.deliver_changes();

    let reconfigures = reconfigures.borrow();
    assert_eq!(reconfigures.len(), 1);
    assert_eq!(reconfigures[0].path, "name");
    assert_eq!(reconfigures[0].value, Some(Value::from("second")));
    assert_eq!(reconfigures[0].old_value, Some(Value::from("first")));
    assert_eq!(reconfigures[0].value, heap.get(o, "name"));
}

#[test]
fn emits_delete_events() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let deletes = record(&handle, "delete");

    heap.set(o, "name", "first").unwrap();
    heap.delete(o, "name").unwrap();
    handle.deliver_changes();

    let deletes = deletes.borrow();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].path, "name");
    assert_eq!(deletes[0].value, None);
    assert_eq!(deletes[0].old_value, Some(Value::from("first")));
    assert_eq!(heap.get(o, "name"), None);
}

#[test]
fn emits_change_events_for_every_kind() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let changes = record(&handle, "change");

    heap.set(o, "name", "first").unwrap();
    heap.delete(o, "name").unwrap();
    handle.deliver_changes();

    let kinds: Vec<ChangeKind> = changes.borrow().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Delete]);
    assert_eq!(changes.borrow()[1].old_value, Some(Value::from("first")));
}

#[test]
fn emits_path_scoped_change_events() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({"first": [{}]}));
    let changes = record(&handle, "change first.0.name");

    let item = heap
        .get_index(child(&heap, o, "first"), 0)
        .and_then(|v| v.as_object())
        .unwrap();
    heap.set(item, "name", "first").unwrap();
    heap.delete(item, "name").unwrap();
    heap.set(item, "other", true).unwrap();
    handle.deliver_changes();

    let changes = changes.borrow();
    let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Add, ChangeKind::Delete]);
    assert_eq!(changes[1].old_value, Some(Value::from("first")));
}

#[test]
fn emission_order_per_event() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let order = Rc::new(RefCell::new(Vec::new()));
    for spec in ["change name", "change", "add name", "add"] {
        let order = Rc::clone(&order);
        handle
            .on(spec, move |_| order.borrow_mut().push(spec))
            .unwrap();
    }

    heap.set(o, "name", "x").unwrap();
    handle.deliver_changes();

    assert_eq!(
        *order.borrow(),
        vec!["add", "add name", "change", "change name"]
    );
}

#[test]
fn category_and_path_listeners_fire_independently() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({"name": "a"}));
    let scoped = record(&handle, "update name");
    let unscoped = record(&handle, "update");
    let other = record(&handle, "update other");
    let adds = record(&handle, "add");

    heap.set(o, "name", "b").unwrap();
    handle.deliver_changes();

    assert_eq!(scoped.borrow().len(), 1);
    assert_eq!(unscoped.borrow().len(), 1);
    assert!(other.borrow().is_empty());
    assert!(adds.borrow().is_empty());
}

#[test]
fn deleting_absent_property_emits_nothing() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({"name": "a"}));
    let changes = record(&handle, "change");

    heap.delete(o, "name").unwrap();
    handle.deliver_changes();
    heap.delete(o, "name").unwrap();
    heap.delete(o, "never").unwrap();
    handle.deliver_changes();

    assert_eq!(changes.borrow().len(), 1);
}

#[test]
fn deliver_changes_flushes_in_mutation_order() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let changes = record(&handle, "change");

    heap.set(o, "a", 1).unwrap();
    heap.set(o, "b", 2).unwrap();
    assert!(changes.borrow().is_empty());
    assert_eq!(handle.deliver_changes(), 1);

    let paths: Vec<String> = changes.borrow().iter().map(|c| c.path.clone()).collect();
    assert_eq!(paths, vec!["a", "b"]);
}

#[test]
fn assignment_scenario() {
    let heap = Heap::new();
    let (root, handle) = observed_json(&heap, json!({}));
    let changes = record(&handle, "change");

    heap.set(root, "name", "x").unwrap();
    handle.deliver_changes();
    heap.set(root, "name", "y").unwrap();
    handle.deliver_changes();

    let changes = changes.borrow();
    assert_eq!(changes.len(), 2);
    assert_eq!(
        (changes[0].kind, changes[0].path.as_str()),
        (ChangeKind::Add, "name")
    );
    assert_eq!(changes[0].value, Some(Value::from("x")));
    assert_eq!(changes[0].old_value, None);
    assert_eq!(
        (changes[1].kind, changes[1].path.as_str()),
        (ChangeKind::Update, "name")
    );
    assert_eq!(changes[1].value, Some(Value::from("y")));
    assert_eq!(changes[1].old_value, Some(Value::from("x")));
}

#[test]
fn immediate_delivery_needs_no_flush() {
    let heap = Heap::with_options(HeapOptions::immediate());
    let root = heap.record();
    let handle = observe(&heap, root).unwrap();
    let changes = record(&handle, "change");

    heap.set(root, "name", "x").unwrap();
    assert_eq!(changes.borrow().len(), 1);
    heap.set(root, "name", "y").unwrap();
    assert_eq!(changes.borrow().len(), 2);
    assert_eq!(changes.borrow()[1].value, Some(Value::from("y")));
}

mod nested {
    use super::*;

    const DOC: &str = r#"{
        "nested": {
            "tags": ["logic audio", "native instruments", "drums"],
            "deeper": [{"x": 3}, {"deeperer": [47, 108]}]
        },
        "array": ["2014-01-01", null]
    }"#;

    fn fixture() -> (Heap, ObjectId, Observed) {
        let heap = Heap::new();
        let doc: serde_json::Value = serde_json::from_str(DOC).unwrap();
        let (root, handle) = observed_json(&heap, doc);
        (heap, root, handle)
    }

    #[test]
    fn one_level_deep() {
        let (heap, root, handle) = fixture();
        let nested = child(&heap, root, "nested");

        let writer = heap.clone();
        let added = record(&handle, "add");
        handle
            .once("add", move |change| {
                writer.set(change.object, "name", "changed").unwrap();
            })
            .unwrap();
        let updated = record(&handle, "update nested.name");

        heap.set(nested, "name", "observed").unwrap();
        handle.deliver_changes();

        let added = added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].path, "nested.name");
        assert_eq!(added[0].value, Some(Value::from("observed")));

        let updated = updated.borrow();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].value, Some(Value::from("changed")));
        assert_eq!(updated[0].value, heap.get(nested, "name"));
    }

    #[test]
    fn two_levels_deep() {
        let (heap, root, handle) = fixture();
        let tags = child(&heap, child(&heap, root, "nested"), "tags");
        let added = record(&handle, "add");
        let length = record(&handle, "update nested.tags.length");

        heap.push(tags, "cajon").unwrap();
        handle.deliver_changes();

        let added = added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(heap.shape(&Value::Object(added[0].object)), Shape::Ordered);
        assert_eq!(added[0].path, "nested.tags.3");
        assert_eq!(added[0].value, Some(Value::from("cajon")));
        assert_eq!(added[0].old_value, None);

        let length = length.borrow();
        assert_eq!(length.len(), 1);
        assert_eq!(length[0].path, "nested.tags.length");
        assert_eq!(length[0].name, "length");
        assert_eq!(length[0].value, Some(Value::from(4usize)));
        assert_eq!(length[0].old_value, Some(Value::from(3usize)));
    }

    #[test]
    fn three_levels_deep() {
        let (heap, root, handle) = fixture();
        let deeper = child(&heap, child(&heap, root, "nested"), "deeper");
        let first = heap.get_index(deeper, 0).and_then(|v| v.as_object()).unwrap();
        let added = record(&handle, "add");

        heap.set(first, "name", "array of objects").unwrap();
        handle.deliver_changes();

        let added = added.borrow();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].name, "name");
        assert_eq!(added[0].path, "nested.deeper.0.name");
        assert_eq!(added[0].value, Some(Value::from("array of objects")));
        assert_eq!(added[0].old_value, None);
    }

    #[test]
    fn begins_listening_to_newly_added_objects() {
        let (heap, root, handle) = fixture();
        let fresh = heap.import_json(&json!({"x": [[{"woot": true}]]}));
        heap.set(root, "newlyAddedObject", fresh).unwrap();

        let writer = heap.clone();
        handle
            .once("add", move |change| {
                let fresh = change.value.as_ref().and_then(Value::as_object).unwrap();
                let x = child(&writer, fresh, "x");
                let inner = writer.get_index(x, 0).and_then(|v| v.as_object()).unwrap();
                let leaf = writer.get_index(inner, 0).and_then(|v| v.as_object()).unwrap();
                writer.set(leaf, "woot", false).unwrap();
            })
            .unwrap();
        let woot = record(&handle, "update newlyAddedObject.x.0.0.woot");

        handle.deliver_changes();

        let woot = woot.borrow();
        assert_eq!(woot.len(), 1);
        assert_eq!(woot[0].value, Some(Value::from(false)));
        assert_eq!(woot[0].old_value, Some(Value::from(true)));
    }
}

#[test]
fn stops_listening_to_deleted_properties() {
    let heap = Heap::new();
    let (o, handle) = observed_json(
        &heap,
        json!({"nil": null, "name": {"last": "h", "first": "a"}}),
    );
    let name = child(&heap, o, "name");
    assert_eq!(handle.observer_count(), 2);

    let second_delete = Rc::new(Cell::new(false));
    let inner = handle.clone();
    let writer = heap.clone();
    let flag = Rc::clone(&second_delete);
    handle
        .once("delete", move |_| {
            assert_eq!(inner.observer_count(), 1);
            let flag = Rc::clone(&flag);
            inner.once("delete", move |_| flag.set(true)).unwrap();
            writer.delete(o, "nil").unwrap();
        })
        .unwrap();
    let under_name = record(&handle, "change name.last");

    heap.delete(o, "name").unwrap();
    handle.deliver_changes();
    assert!(second_delete.get());

    heap.set(name, "last", "z").unwrap();
    handle.deliver_changes();
    assert!(under_name.borrow().is_empty());

    // The listener holds a clone of the handle.
    handle.close();
}

#[test]
fn listens_to_array_manipulation() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!([]));
    let times = Rc::new(Cell::new(0));

    let inner = handle.clone();
    let writer = heap.clone();
    let counter = Rc::clone(&times);
    handle
        .once("add", move |change| {
            assert_eq!(change.value, Some(Value::from(3)));
            let counter = Rc::clone(&counter);
            inner
                .on("add", move |_| counter.set(counter.get() + 1))
                .unwrap();
            for n in 4..8 {
                writer.push(o, n).unwrap();
            }
        })
        .unwrap();

    heap.push(o, 3).unwrap();
    handle.deliver_changes();

    assert_eq!(times.get(), 4);
    assert_eq!(heap.to_json(&Value::Object(o)), json!([3, 4, 5, 6, 7]));
    handle.close();
}

#[test]
fn deliver_changes_covers_nested_objects() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let times = Rc::new(Cell::new(0));
    let counter = Rc::clone(&times);
    handle
        .on("change", move |_| counter.set(counter.get() + 1))
        .unwrap();

    let godzilla = heap.import_json(&json!({"big": true}));
    heap.set(o, "godzilla", godzilla.clone()).unwrap();
    handle.deliver_changes();
    assert_eq!(times.get(), 1);

    heap.set(godzilla.as_object().unwrap(), "big", "BOOOM").unwrap();
    handle.deliver_changes();
    assert_eq!(times.get(), 2);
}

#[test]
fn path_listeners_accept_any_emitted_path() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({"first name": "a"}));
    let spaced = record(&handle, "update first name");
    let empty_key = record(&handle, "add ");

    heap.set(o, "first name", "b").unwrap();
    heap.set(o, "", true).unwrap();
    handle.deliver_changes();

    assert_eq!(spaced.borrow().len(), 1);
    assert_eq!(spaced.borrow()[0].path, "first name");
    assert_eq!(spaced.borrow()[0].value, Some(Value::from("b")));
    assert_eq!(empty_key.borrow().len(), 1);
    assert_eq!(empty_key.borrow()[0].path, "");
}

#[test]
fn path_listeners_reach_deeply_nested_changes() {
    let depth = 300;
    let doc = (0..depth).fold(json!({}), |inner, _| json!({ "n": inner }));
    let heap = Heap::new();
    let (mut leaf, handle) = observed_json(&heap, doc);
    for _ in 0..depth {
        leaf = child(&heap, leaf, "n");
    }
    let path = format!("{}.x", vec!["n"; depth].join("."));
    let adds = record(&handle, &format!("add {path}"));

    heap.set(leaf, "x", 1).unwrap();
    handle.deliver_changes();

    assert_eq!(adds.borrow().len(), 1);
    assert_eq!(adds.borrow()[0].path, path);
}

#[test]
fn listener_can_flush_changes_it_makes() {
    let heap = Heap::new();
    let (o, handle) = observed_json(&heap, json!({}));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let inner = handle.clone();
    handle
        .on("change", move |change| {
            sink.borrow_mut().push(change.path.clone());
            if change.path == "a" {
                inner.heap().set(change.object, "b", 2).unwrap();
                inner.deliver_changes();
            }
        })
        .unwrap();

    heap.set(o, "a", 1).unwrap();
    handle.deliver_changes();
    assert_eq!(*seen.borrow(), vec!["a", "b"]);

    // The listener holds a handle clone.
    handle.close();
}
