//=========================================================================
// State Machine Engine
//=========================================================================
//
// Named-transition finite state machines with lifecycle hooks.
//
// Architecture:
//   MachineRegistry
//     └─ StateMachine ×N
//          ├─ TransitionDef   (name, source, target)
//          ├─ hook handlers   (onBefore<T>, onEnter<S>, ...)
//          └─ StateBehaviour  (optional, per state)
//
// Hooks may suspend a transition by returning a `Deferred<bool>`; the
// registry's `poll_all` resumes it once settled.
//
//=========================================================================

mod behaviour;
mod deferred;
mod error;
mod lifecycle;
mod machine;
mod registry;
mod transition;

//=== Public API ==========================================================

pub use behaviour::StateBehaviour;
pub use deferred::{deferred, Deferred, Resolver, Settlement};
pub use error::FsmError;
pub use lifecycle::{Hook, HookFn, HookResult, Lifecycle};
pub use machine::{
    Fired, MachineConfig, Rejection, RejectionFn, StateMachine, INIT_TRANSITION, NONE_STATE,
};
pub use registry::MachineRegistry;
pub use transition::{Destination, Source, Target, TargetFn, TransitionDef, ANY_STATE};
