//=========================================================================
// Event Bus
//=========================================================================
//
// Name-keyed publish/subscribe registry with priority ordering.
//
// Architecture:
//   add_listener(name, priority, fn) → HashMap<String, ListenerList>
//                                              ↓
//   raise(name, payload) ─→ snapshot ─→ call each listener in order
//
// Dispatch works on a snapshot of the listener list, so listeners may add
// or remove listeners (on any event) while an event is being raised. The
// change takes effect from the next raise.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::listener::{Listener, ListenerId, ListenerList};
use crate::core::value::ArgValue;

//=== EventBus ============================================================

/// Priority-ordered publish/subscribe registry.
///
/// All methods take `&self`; the bus is meant to be shared through an
/// `Rc<EventBus>` between the systems of one application context.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: RefCell<HashMap<String, ListenerList>>,
    next_id: Cell<u64>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    //--- Registration -----------------------------------------------------

    /// Registers a listener for `event`.
    ///
    /// Listeners with a higher `priority` run first. Returns `None` and logs
    /// a warning if `event` is empty.
    pub fn add_listener<F>(&self, event: &str, priority: i32, callback: F) -> Option<ListenerId>
    where
        F: Fn(&str, &ArgValue) + 'static,
    {
        if event.is_empty() {
            warn!("Refusing to register a listener for an empty event name");
            return None;
        }

        let id = self.allocate_id();
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .insert(Listener {
                id,
                priority,
                callback: Rc::new(callback),
            });

        Some(id)
    }

    /// Replaces every listener of `event` with a single new listener.
    pub fn set_listener<F>(&self, event: &str, priority: i32, callback: F) -> Option<ListenerId>
    where
        F: Fn(&str, &ArgValue) + 'static,
    {
        if event.is_empty() {
            warn!("Refusing to set a listener for an empty event name");
            return None;
        }

        self.listeners.borrow_mut().remove(event);
        self.add_listener(event, priority, callback)
    }

    /// Removes one listener. Returns true if it was registered for `event`.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };

        let removed = list.remove(id);
        if list.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Removes every listener of `event`.
    pub fn remove_all(&self, event: &str) {
        self.listeners.borrow_mut().remove(event);
    }

    //--- Dispatch ---------------------------------------------------------

    /// Calls every listener of `event` in priority order.
    ///
    /// Returns the number of listeners invoked.
    pub fn raise(&self, event: &str, payload: &ArgValue) -> usize {
        let callbacks = match self.listeners.borrow().get(event) {
            Some(list) => list.snapshot(),
            None => return 0,
        };

        debug!("Raising event '{}' to {} listener(s)", event, callbacks.len());
        for callback in &callbacks {
            callback(event, payload);
        }

        callbacks.len()
    }

    //--- Query API --------------------------------------------------------

    /// Returns the number of listeners registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, ListenerList::len)
    }

    /// Returns true if at least one listener is registered for `event`.
    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    fn allocate_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }
}

//=========================================================================
// Tests
//=========================================================================
