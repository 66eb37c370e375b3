//=========================================================================
// Tips
//=========================================================================
//
// Per-scene prompts layered above the regular UI stack.
//
//   Dialog   modal, stacked from UiLayer::Dialog upwards; hide_tips
//            closes the newest one
//   Toast    non-modal, stacked from UiLayer::Toast upwards; closed
//            once its duration has elapsed
//
// Tips are ordinary UIs opened through the scene's UiManager with a
// z-order override, so loading, blockers, caching and request queueing
// all follow the manager's rules.
//
//=========================================================================

use std::collections::BTreeMap;

use log::{debug, warn};

use super::descriptor::{UiId, UiLayer};
use super::error::UiError;
use super::manager::UiManager;
use super::request::{CloseTarget, OpenRequest};
use super::view::ViewKey;
use crate::core::value::ArgValue;

//=== TipsKind ============================================================

/// How a registered tip is layered and dismissed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TipsKind {
    /// Modal prompt, dismissed by [`TipsManager::hide_tips`] or by itself.
    Dialog,
    /// Non-modal notice, closed after `duration` seconds of updates.
    Toast { duration: f32 },
}

//=== TipsManager =========================================================

#[derive(Debug, Clone, Copy)]
struct Toast {
    key: ViewKey,
    remaining: f32,
}

/// Dialog stack and toast set of one scene.
#[derive(Debug)]
pub struct TipsManager {
    scene: String,
    kinds: BTreeMap<UiId, TipsKind>,
    dialogs: Vec<ViewKey>,
    toasts: Vec<Toast>,
}

impl TipsManager {
    pub fn new(scene: impl Into<String>) -> Self {
        Self {
            scene: scene.into(),
            kinds: BTreeMap::new(),
            dialogs: Vec::new(),
            toasts: Vec::new(),
        }
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Replaces every registration.
    pub fn init_conf(&mut self, kinds: BTreeMap<UiId, TipsKind>) {
        self.kinds = kinds;
    }

    pub fn register(&mut self, id: UiId, kind: TipsKind) {
        self.kinds.insert(id, kind);
    }

    pub fn kind(&self, id: UiId) -> Option<TipsKind> {
        self.kinds.get(&id).copied()
    }

    //--- Show / Hide ------------------------------------------------------

    /// Opens a registered tip above the existing ones of its kind.
    ///
    /// The returned key stays valid while the open waits in the
    /// manager's queue.
    pub fn show_tips(
        &mut self,
        ui: &mut UiManager,
        id: UiId,
        args: Vec<ArgValue>,
    ) -> Result<ViewKey, UiError> {
        let Some(kind) = self.kind(id) else {
            warn!("[{}] show_tips: {} is not a registered tip", self.scene, id);
            return Err(UiError::UnknownTips(id));
        };
        self.prune(ui);

        let z_order = match kind {
            TipsKind::Dialog => UiLayer::Dialog.z_order() + layer_offset(self.dialogs.len()),
            TipsKind::Toast { .. } => UiLayer::Toast.z_order() + layer_offset(self.toasts.len()),
        };
        let key = ui
            .open_request(OpenRequest::new(id, args).with_z_order(z_order))?
            .key();

        match kind {
            TipsKind::Dialog => self.dialogs.push(key),
            TipsKind::Toast { duration } => self.toasts.push(Toast {
                key,
                remaining: duration,
            }),
        }
        debug!("[{}] showing tip {} at z {}", self.scene, key, z_order);
        Ok(key)
    }

    /// Closes the newest dialog. Returns false if none is showing.
    pub fn hide_tips(&mut self, ui: &mut UiManager) -> bool {
        self.prune(ui);
        let Some(key) = self.dialogs.pop() else {
            return false;
        };
        debug!("[{}] hiding tip {}", self.scene, key);
        ui.close(CloseTarget::View(key));
        true
    }

    //--- Frame Update -----------------------------------------------------

    /// Counts toast lifetimes down and closes the expired ones.
    pub fn update(&mut self, ui: &mut UiManager, dt: f32) {
        self.prune(ui);
        let mut expired = Vec::new();
        self.toasts.retain_mut(|toast| {
            toast.remaining -= dt;
            if toast.remaining <= 0.0 {
                expired.push(toast.key);
                false
            } else {
                true
            }
        });
        for key in expired {
            debug!("[{}] toast {} expired", self.scene, key);
            ui.close(CloseTarget::View(key));
        }
    }

    /// Forgets tips the manager no longer holds (closed by their view,
    /// failed to load, or torn down).
    pub fn prune(&mut self, ui: &UiManager) {
        self.dialogs.retain(|key| ui.is_live(*key));
        self.toasts.retain(|toast| ui.is_live(toast.key));
    }

    /// Forgets every tip without closing anything.
    pub fn clear(&mut self) {
        self.dialogs.clear();
        self.toasts.clear();
    }

    //--- Queries ----------------------------------------------------------

    pub fn dialog_count(&self) -> usize {
        self.dialogs.len()
    }

    pub fn toast_count(&self) -> usize {
        self.toasts.len()
    }

    pub fn top_dialog(&self) -> Option<ViewKey> {
        self.dialogs.last().copied()
    }
}

fn layer_offset(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

//=========================================================================
// Tests
//=========================================================================
