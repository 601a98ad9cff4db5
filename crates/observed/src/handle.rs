//! The observation handle.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use observed_heap::{Heap, MutationCallback, MutationSource, ObjectId, RawRecord, Value};
use tracing::{debug, trace};

use crate::emitter::{Emitter, ListenerId};
use crate::error::ObserveError;
use crate::event::ChangeEvent;
use crate::event_spec::EventSpec;
use crate::graph::{GraphContext, ObserverGraph, Subscriber};
use crate::options::ObserveOptions;
use crate::translate::translate;

/// Observe `root` and everything reachable from it.
///
/// A root that is not a container yields a handle with nothing to observe.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use observed::{observe, Heap};
///
/// let heap = Heap::new();
/// let root = heap.record();
/// let handle = observe(&heap, root).unwrap();
///
/// let paths = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&paths);
/// handle
///     .on("add", move |change| sink.borrow_mut().push(change.path.clone()))
///     .unwrap();
///
/// heap.set(root, "name", "observed").unwrap();
/// handle.deliver_changes();
/// assert_eq!(*paths.borrow(), vec!["name".to_string()]);
/// ```
pub fn observe(heap: &Heap, root: impl Into<Value>) -> Result<Observed, ObserveError> {
    Observed::with_options(heap, root, ObserveOptions::default())
}

/// Handle to one observed object graph.
///
/// Clones share the graph and the listeners. The graph is released when the
/// handle is closed or the last clone is dropped.
#[derive(Clone)]
pub struct Observed {
    shared: Rc<Shared>,
}

struct Shared {
    this: Weak<Shared>,
    heap: Heap,
    source: Rc<dyn MutationSource>,
    options: ObserveOptions,
    root: Value,
    graph: RefCell<ObserverGraph>,
    emitter: Emitter<ChangeEvent>,
    closed: Cell<bool>,
}

impl Observed {
    pub fn with_options(
        heap: &Heap,
        root: impl Into<Value>,
        options: ObserveOptions,
    ) -> Result<Self, ObserveError> {
        Self::with_source(heap, Rc::new(heap.clone()), root, options)
    }

    /// Observe through another mutation source. `heap` is still used to read
    /// the graph.
    pub fn with_source(
        heap: &Heap,
        source: Rc<dyn MutationSource>,
        root: impl Into<Value>,
        options: ObserveOptions,
    ) -> Result<Self, ObserveError> {
        let root = root.into();
        let shared = Rc::new_cyclic(|this| Shared {
            this: Weak::clone(this),
            heap: heap.clone(),
            source,
            options,
            root: root.clone(),
            graph: RefCell::new(ObserverGraph::default()),
            emitter: Emitter::new(),
            closed: Cell::new(false),
        });
        let observed = Observed { shared };
        if let Some(object) = root.as_object() {
            observed.shared.context().attach(object, String::new(), None)?;
        }
        debug!(
            observers = observed.observer_count(),
            "observing object graph"
        );
        Ok(observed)
    }

    /// Listen for events matching `spec` (`"update"`, `"change first.0.name"`,
    /// ...).
    pub fn on<F>(&self, spec: &str, listener: F) -> Result<ListenerId, ObserveError>
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let spec: EventSpec = spec.parse()?;
        Ok(self.shared.emitter.on(spec.to_string(), listener))
    }

    pub fn add_listener<F>(&self, spec: &str, listener: F) -> Result<ListenerId, ObserveError>
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        self.on(spec, listener)
    }

    /// Like [`on`](Self::on), but the listener is removed before its first
    /// call.
    pub fn once<F>(&self, spec: &str, listener: F) -> Result<ListenerId, ObserveError>
    where
        F: FnMut(&ChangeEvent) + 'static,
    {
        let spec: EventSpec = spec.parse()?;
        Ok(self.shared.emitter.once(spec.to_string(), listener))
    }

    pub fn off(&self, spec: &str, id: ListenerId) -> bool {
        match spec.parse::<EventSpec>() {
            Ok(spec) => self.shared.emitter.off(&spec.to_string(), id),
            Err(_) => false,
        }
    }

    /// Call the listeners registered under exactly `name` with `event`.
    pub fn emit(&self, name: &str, event: &ChangeEvent) -> usize {
        self.shared.emitter.emit(name, event)
    }

    pub fn listener_count(&self, spec: &str) -> usize {
        self.shared.emitter.listener_count(spec)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.shared.emitter.event_names()
    }

    pub fn remove_all_listeners(&self, spec: Option<&str>) {
        self.shared.emitter.remove_all(spec);
    }

    /// Deliver every pending change in the observed graph now, including
    /// changes made by listeners while this runs. Returns how many record
    /// batches were delivered.
    pub fn deliver_changes(&self) -> usize {
        let mut delivered = 0;
        loop {
            let subscriptions = self.shared.graph.borrow().subscriptions();
            let before = delivered;
            for subscription in subscriptions {
                if self.shared.source.deliver(subscription) {
                    delivered += 1;
                }
            }
            if delivered == before {
                return delivered;
            }
        }
    }

    /// Observed objects, in the order they were first observed.
    pub fn observers(&self) -> Vec<ObjectId> {
        self.shared.graph.borrow().observers()
    }

    pub fn observer_count(&self) -> usize {
        self.shared.graph.borrow().len()
    }

    /// Path an observed object is registered under; `""` for the root.
    pub fn path_of(&self, object: ObjectId) -> Option<String> {
        self.shared
            .graph
            .borrow()
            .path_of(object)
            .map(str::to_owned)
    }

    pub fn root(&self) -> &Value {
        &self.shared.root
    }

    pub fn heap(&self) -> &Heap {
        &self.shared.heap
    }

    pub fn options(&self) -> &ObserveOptions {
        &self.shared.options
    }

    /// Stop observing and drop every listener. Pending records are
    /// discarded.
    pub fn close(&self) {
        if self.shared.closed.replace(true) {
            return;
        }
        self.shared.release_all();
        self.shared.emitter.remove_all(None);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    fn receive(&self, owner: ObjectId, records: &[RawRecord]) {
        if self.is_closed() {
            return;
        }
        let events = translate(&self.shared.context(), &self.shared.options, owner, records);
        for event in &events {
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: &ChangeEvent) {
        trace!(kind = %event.kind, path = %event.path, "emitting change");
        for name in EventSpec::fire_order(event) {
            self.shared.emitter.emit(&name, event);
        }
    }
}

impl Shared {
    fn context(&self) -> GraphContext<'_> {
        GraphContext {
            heap: &self.heap,
            source: &*self.source,
            graph: &self.graph,
            subscriber: &self.this,
        }
    }

    fn release_all(&self) {
        let subscriptions = self.graph.borrow_mut().clear();
        let released = subscriptions.len();
        for subscription in subscriptions {
            self.source.unobserve_mutations(subscription);
        }
        debug!(released, "stopped observing object graph");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if !self.closed.get() {
            self.release_all();
        }
    }
}

impl Subscriber for Weak<Shared> {
    fn callback(&self, object: ObjectId) -> MutationCallback {
        let shared = Weak::clone(self);
        Rc::new(move |records: &[RawRecord]| {
            if let Some(shared) = shared.upgrade() {
                Observed { shared }.receive(object, records);
            }
        })
    }
}
