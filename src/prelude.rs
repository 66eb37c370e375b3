//=========================================================================
// Prelude
//=========================================================================
//
// Convenience module that re-exports commonly used types and traits.
//
// Usage:
//   use aetheric_ui::prelude::*;
//
//=========================================================================

//=== Public API ==========================================================

// Application context
pub use crate::context::{AppContext, AppContextBuilder};

// Values and events
pub use crate::core::event_bus::EventBus;
pub use crate::core::value::ArgValue;

// Assets
pub use crate::core::assets::{Asset, AssetHandle, AssetKeeper, AssetLoader, LoadDone, LoadRequest};

// UI stack
pub use crate::core::ui::{
    Canvas, CloseTarget, OpenOutcome, OpenRequest, ShowType, TipsKind, TipsManager, UiAnimator,
    UiBackend, UiConfig, UiDescriptor, UiId, UiManager, UiView, ViewContext, ViewFactory,
    ViewInstance,
};

// State machines
pub use crate::core::fsm::{
    Hook, HookResult, MachineConfig, MachineRegistry, StateBehaviour, StateMachine, TransitionDef,
};
