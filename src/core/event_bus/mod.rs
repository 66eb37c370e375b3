//=========================================================================
// Event Bus
//=========================================================================
//
// Immediate, name-keyed notification between framework systems.
//
// Architecture:
//   EventBus
//     └─ listeners: HashMap<String, ListenerList>  (priority ordered)
//
// Flow:
//   add_listener() → raise() → listener(name, payload)
//
//=========================================================================

//=== Module Declarations =================================================

mod event_bus;
mod listener;

//=== Public API ==========================================================

pub use event_bus::EventBus;
pub use listener::{ListenerFn, ListenerId};
