//=========================================================================
// UI Stack
//=========================================================================
//
// Per-scene UI manager: opens screens by id, keeps them ordered by
// z-order, caches closed instances and serialises concurrent requests.
//
// Architecture:
//   UiManager
//     ├─ UiConfig         (descriptors by id, from TOML or code)
//     ├─ stack            (UiStackEntry, bottom → top)
//     ├─ cache            (closed cacheable views)
//     └─ UiBackend
//          ├─ AssetLoader   (asset pipeline)
//          ├─ ViewFactory   (asset → node + UiView)
//          ├─ Canvas        (scene graph, blockers)
//          └─ UiAnimator    (open / close clips)
//
//   TipsManager          (dialog stack and toasts on the upper layers,
//                         opened through the scene's UiManager)
//
// Views talk back through `ViewContext`, which records commands the
// manager queues once the hook returns.
//
//=========================================================================

mod animation;
mod canvas;
mod completion;
mod descriptor;
mod error;
mod manager;
mod request;
mod tips;
mod view;
mod visibility;

#[cfg(test)]
pub(crate) mod testing;


//=== Public API ==========================================================

pub use animation::{AnimationClip, AnimationDone, ImmediateAnimator, ManualAnimator, UiAnimator};
pub use canvas::{BlockerId, Canvas, Child, HeadlessCanvas, Layer, SiblingOrder};
pub use descriptor::{Color, ConfigError, ShowType, UiConfig, UiDescriptor, UiId, UiLayer};
pub use error::UiError;
pub use manager::{
    CloseDelegate, OpenDelegate, OpenOutcome, Phase, UiBackend, UiManager, UiStackEntry,
};
pub use request::{CloseTarget, OpenRequest, UiCommand};
pub use tips::{TipsKind, TipsManager};
pub use view::{InstantiateError, NodeId, UiView, ViewContext, ViewFactory, ViewInstance, ViewKey};
pub use visibility::compute_visibility;
