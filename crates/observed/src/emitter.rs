//! Multi-event listener registry.
//!
//! Listeners are keyed by event name. Every method takes `&self`, so listeners
//! may register, remove, or emit while an emit is in progress; each emit works
//! on a snapshot of the listeners registered when it started.
//!
//! A listener is never re-entered. When an emit reaches a listener that is
//! still running further up the stack, the call is queued and made as soon as
//! the outermost emit returns.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::debug;

pub type ListenerId = u64;

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Registration<E> {
    id: ListenerId,
    once: bool,
    listener: Listener<E>,
}

pub struct Emitter<E> {
    next_id: Cell<ListenerId>,
    events: RefCell<BTreeMap<String, Vec<Registration<E>>>>,
    /// Number of emits currently on the stack.
    depth: Cell<usize>,
    /// Calls that found their listener busy, in emission order.
    deferred: RefCell<VecDeque<(Listener<E>, E)>>,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(1),
            events: RefCell::new(BTreeMap::new()),
            depth: Cell::new(0),
            deferred: RefCell::new(VecDeque::new()),
        }
    }
}

/// Keeps `depth` balanced when a listener unwinds.
struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl<E: Clone + 'static> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(event.into(), false, Rc::new(RefCell::new(listener)))
    }

    /// Register a listener that is removed right before its first call.
    pub fn once<F>(&self, event: impl Into<String>, listener: F) -> ListenerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(event.into(), true, Rc::new(RefCell::new(listener)))
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut events = self.events.borrow_mut();
        let Some(regs) = events.get_mut(event) else {
            return false;
        };
        let before = regs.len();
        regs.retain(|reg| reg.id != id);
        let removed = regs.len() != before;
        if regs.is_empty() {
            events.remove(event);
        }
        removed
    }

    /// Remove every listener of `event`, or of all events when `None`.
    ///
    /// Removing all listeners also drops calls still queued for busy ones.
    pub fn remove_all(&self, event: Option<&str>) {
        let mut events = self.events.borrow_mut();
        match event {
            Some(name) => {
                events.remove(name);
            }
            None => {
                events.clear();
                self.deferred.borrow_mut().clear();
            }
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.borrow().get(event).map_or(0, Vec::len)
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events.borrow().keys().cloned().collect()
    }

    /// Call every listener of `event` in registration order and return how
    /// many were reached.
    ///
    /// A listener that is still running further up the stack (it caused this
    /// emit) is not re-entered: it receives `payload` after the outermost emit
    /// returns, in the order such calls were queued.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        let snapshot: Vec<Listener<E>> = {
            let mut events = self.events.borrow_mut();
            let Some(regs) = events.get_mut(event) else {
                return 0;
            };
            let snapshot: Vec<Listener<E>> =
                regs.iter().map(|reg| Rc::clone(&reg.listener)).collect();
            regs.retain(|reg| !reg.once);
            if regs.is_empty() {
                events.remove(event);
            }
            snapshot
        };
        let reached = snapshot.len();
        {
            let _depth = DepthGuard::enter(&self.depth);
            for listener in snapshot {
                self.call(event, listener, payload);
            }
        }
        if self.depth.get() == 0 {
            self.drain();
        }
        reached
    }

    fn call(&self, event: &str, listener: Listener<E>, payload: &E) {
        if let Ok(mut running) = listener.try_borrow_mut() {
            (&mut *running)(payload);
            return;
        }
        debug!(event, "deferring call to busy listener");
        self.deferred
            .borrow_mut()
            .push_back((listener, payload.clone()));
    }

    /// Make the queued calls; runs only once no emit is on the stack.
    fn drain(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            let Some((listener, payload)) = next else {
                break;
            };
            let _depth = DepthGuard::enter(&self.depth);
            self.call("deferred", listener, &payload);
        }
    }

    fn register(&self, event: String, once: bool, listener: Listener<E>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id.saturating_add(1));
        self.events
            .borrow_mut()
            .entry(event)
            .or_default()
            .push(Registration { id, once, listener });
        id
    }
}
