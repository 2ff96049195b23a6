//! String-keyed publish/subscribe.
//!
//! Delivery is synchronous and happens in subscription order. `publish` dispatches to a
//! snapshot of the matching handlers taken when the call starts, but re-checks that each
//! subscription is still live right before invoking it, so a handler removed by an
//! earlier handler of the same dispatch is never called. Handlers may freely publish,
//! subscribe and unsubscribe from inside a dispatch.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value as JsonValue;
use storybeat_api::Signal;
use tracing::{trace, warn};

/// Identifies one registered handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Rc<RefCell<dyn FnMut(&Signal)>>;

struct Entry {
    id: SubscriptionId,
    name: String,
    handler: Handler,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    entries: Vec<Entry>,
    journaling: bool,
    journal: Vec<Signal>,
}

/// Cheap clonable handle to a shared bus.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Rc<RefCell<BusState>>,
}

/// Non-owning bus handle, used by guards and handlers that must not keep the bus alive.
#[derive(Clone, Default)]
pub struct WeakBus {
    state: Weak<RefCell<BusState>>,
}

impl WeakBus {
    pub fn upgrade(&self) -> Option<EventBus> {
        self.state.upgrade().map(|state| EventBus { state })
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bus that keeps a copy of every published signal until [`EventBus::drain_journal`].
    pub fn with_journal() -> Self {
        let bus = Self::new();
        bus.state.borrow_mut().journaling = true;
        bus
    }

    pub fn downgrade(&self) -> WeakBus {
        WeakBus {
            state: Rc::downgrade(&self.state),
        }
    }

    /// Register `handler` for signals named `name`. The handler stays registered until
    /// [`EventBus::unsubscribe`] is called with the returned id.
    pub fn subscribe<F>(&self, name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: FnMut(&Signal) + 'static,
    {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        let handler: Handler = Rc::new(RefCell::new(handler));
        state.entries.push(Entry {
            id,
            name: name.into(),
            handler,
        });
        id
    }

    /// Like [`EventBus::subscribe`], but the handler is removed when the guard drops.
    pub fn subscribe_scoped<F>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: FnMut(&Signal) + 'static,
    {
        let id = self.subscribe(name, handler);
        self.guard(id)
    }

    /// Wrap an existing registration in a guard.
    pub(crate) fn guard(&self, id: SubscriptionId) -> Subscription {
        Subscription {
            bus: self.downgrade(),
            id,
        }
    }

    /// Remove a handler. Returns `false` if it was already gone, which is harmless.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut state = self.state.borrow_mut();
            state
                .entries
                .iter()
                .position(|e| e.id == id)
                .map(|idx| state.entries.remove(idx))
        };
        // The entry (and the closure it owns) is dropped with the borrow released, so a
        // closure that owns a guard on this bus can unsubscribe during its own drop.
        removed.is_some()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.state.borrow().entries.iter().any(|e| e.id == id)
    }

    /// Number of live handlers for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|e| e.name == name)
            .count()
    }

    /// Deliver `signal` to every live handler registered under its name.
    pub fn publish(&self, signal: Signal) {
        let targets: Vec<(SubscriptionId, Handler)> = {
            let mut state = self.state.borrow_mut();
            if state.journaling {
                state.journal.push(signal.clone());
            }
            state
                .entries
                .iter()
                .filter(|e| e.name == signal.name)
                .map(|e| (e.id, Rc::clone(&e.handler)))
                .collect()
        };
        trace!(signal = %signal.name, handlers = targets.len(), "publish");

        for (id, handler) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            match handler.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(&signal),
                Err(_) => warn!(
                    signal = %signal.name,
                    "handler re-entered by a signal it published; skipped"
                ),
            }
        }
    }

    /// Shorthand for publishing a signal built from a name and payload.
    pub fn emit(&self, name: impl Into<String>, payload: JsonValue) {
        self.publish(Signal::with_payload(name, payload));
    }

    /// Take every signal published since the last drain (journaling buses only).
    pub fn drain_journal(&self) -> Vec<Signal> {
        std::mem::take(&mut self.state.borrow_mut().journal)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventBus")
            .field("handlers", &state.entries.len())
            .field("journaling", &state.journaling)
            .finish()
    }
}

impl fmt::Debug for WeakBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBus")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

/// RAII guard for a handler registration.
#[must_use = "dropping a Subscription unsubscribes its handler"]
#[derive(Debug)]
pub struct Subscription {
    bus: WeakBus,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Keep the handler registered past the guard's lifetime.
    pub fn detach(mut self) -> SubscriptionId {
        self.bus = WeakBus::default();
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}
