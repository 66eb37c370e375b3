//=========================================================================
// UI Views
//=========================================================================
//
// The view-side contract of the UI manager.
//
// Architecture:
//   ViewFactory::instantiate(descriptor, asset) → ViewInstance { node, view }
//
//   UiView hooks, in order:
//     init → on_open → on_open_animation_over → ... → on_close
//     on_top(closed, result) when the UI above it closes
//
// Hooks receive a `ViewContext` through which a view may request further
// opens or closes. Requests are applied after the hook returns.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

use thiserror::Error;

//=== Internal Dependencies ===============================================

use super::descriptor::{UiDescriptor, UiId};
use super::request::{CloseTarget, UiCommand};
use crate::core::assets::{AssetHandle, AssetKeeper};
use crate::core::value::ArgValue;

//=== Identifiers =========================================================

/// Identifies one open instance of a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewKey {
    pub ui_id: UiId,
    /// Monotonic per manager; never reused.
    pub instance: u64,
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.ui_id, self.instance)
    }
}

/// Handle of a view's root node in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

//=== ViewContext =========================================================

/// Request channel handed to view hooks.
pub struct ViewContext<'a> {
    key: ViewKey,
    commands: &'a mut Vec<UiCommand>,
}

impl<'a> ViewContext<'a> {
    pub(crate) fn new(key: ViewKey, commands: &'a mut Vec<UiCommand>) -> Self {
        Self { key, commands }
    }

    /// Key of the view receiving the hook.
    pub fn key(&self) -> ViewKey {
        self.key
    }

    /// Requests opening `id` with `args`.
    pub fn open(&mut self, id: UiId, args: Vec<ArgValue>) {
        self.commands.push(UiCommand::Open { id, args });
    }

    /// Requests closing this view.
    pub fn close_self(&mut self) {
        self.commands.push(UiCommand::Close(CloseTarget::View(self.key)));
    }

    /// Requests closing whatever is on top of the stack.
    pub fn close_top(&mut self) {
        self.commands.push(UiCommand::Close(CloseTarget::Top));
    }
}

//=== UiView ==============================================================

/// A UI screen driven by the manager.
pub trait UiView {
    /// Keeper holding the assets this view depends on.
    fn keeper(&mut self) -> &mut AssetKeeper;

    /// Called once, right after instantiation. Not called on cache reuse.
    fn init(&mut self, _args: &[ArgValue]) {}

    /// Called each time the view is opened. `from` is the UI beneath it.
    fn on_open(&mut self, _ctx: &mut ViewContext<'_>, _from: Option<UiId>, _args: &[ArgValue]) {}

    fn on_open_animation_over(&mut self, _ctx: &mut ViewContext<'_>) {}

    /// Called when the view closes; the result is handed to the view
    /// that becomes top, if any.
    fn on_close(&mut self, _ctx: &mut ViewContext<'_>) -> ArgValue {
        ArgValue::Null
    }

    /// Called when the UI above this one closed and this view is top again.
    fn on_top(&mut self, _ctx: &mut ViewContext<'_>, _closed: UiId, _result: ArgValue) {}

    fn cache_asset(&mut self, asset: AssetHandle) {
        self.keeper().cache_asset(asset);
    }

    fn release_assets(&mut self) {
        self.keeper().release_assets();
    }
}

//=== ViewFactory =========================================================

/// Instantiation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiateError {
    #[error("asset '{path}' could not be instantiated")]
    NoInstance { path: String },

    /// The node was created but carries no view; the factory has
    /// already destroyed it.
    #[error("instance of '{path}' has no view component")]
    MissingView { path: String },
}

/// A freshly instantiated view and its root node.
pub struct ViewInstance {
    pub node: NodeId,
    pub view: Box<dyn UiView>,
}

impl fmt::Debug for ViewInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewInstance")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Creates views from loaded assets.
pub trait ViewFactory {
    fn instantiate(
        &mut self,
        descriptor: &UiDescriptor,
        asset: &AssetHandle,
    ) -> Result<ViewInstance, InstantiateError>;
}

//=========================================================================
// Tests
//=========================================================================
