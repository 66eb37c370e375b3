//=========================================================================
// Listener Entries
//=========================================================================
//
// Storage for a single event's listeners, kept sorted by priority.
//
// Higher priority listeners run first. Listeners with equal priority run
// in registration order, so insertion uses an upper-bound search rather
// than a full re-sort.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;
use std::rc::Rc;

//=== Internal Dependencies ===============================================

use crate::core::value::ArgValue;

//=== Public API ==========================================================

/// Callback invoked with the raised event name and its payload.
pub type ListenerFn = dyn Fn(&str, &ArgValue);

/// Handle identifying a registered listener.
///
/// Returned by [`super::EventBus::add_listener`] and used to remove the
/// listener again. Ids are never reused within one bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(super) u64);

//=========================================================================

#[derive(Clone)]
pub(super) struct Listener {
    pub(super) id: ListenerId,
    pub(super) priority: i32,
    pub(super) callback: Rc<ListenerFn>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

//=========================================================================

/// Priority-ordered listener list for one event name.
#[derive(Debug, Default)]
pub(super) struct ListenerList {
    entries: Vec<Listener>,
}

impl ListenerList {
    /// Inserts after every listener with priority >= `listener.priority`.
    pub(super) fn insert(&mut self, listener: Listener) {
        let pos = self
            .entries
            .partition_point(|existing| existing.priority >= listener.priority);
        self.entries.insert(pos, listener);
    }

    /// Removes a listener by id. Returns true if it was present.
    pub(super) fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.iter().position(|l| l.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Copies the callbacks out so dispatch never holds a borrow on the list.
    pub(super) fn snapshot(&self) -> Vec<Rc<ListenerFn>> {
        self.entries.iter().map(|l| Rc::clone(&l.callback)).collect()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(super) fn ids(&self) -> Vec<ListenerId> {
        self.entries.iter().map(|l| l.id).collect()
    }
}

//=========================================================================
// Tests
//=========================================================================
