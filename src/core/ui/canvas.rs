//=========================================================================
// Canvas
//=========================================================================
//
// The scene-graph parent that UI nodes and touch blockers attach to.
//
// Sibling order is a (z_order, layer) pair compared lexicographically,
// so a UI's blocker always sits directly beneath the UI itself:
//
//   (1, Blocker) < (1, Content) < (2, Blocker) < (2, Content)
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, warn};

//=== Internal Dependencies ===============================================

use super::descriptor::Color;
use super::view::{NodeId, ViewKey};

//=== Ordering ============================================================

/// Layer within one z-order slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Blocker,
    Content,
}

/// Position of a node among the canvas children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiblingOrder {
    pub z_order: i32,
    pub layer: Layer,
}

impl SiblingOrder {
    pub const fn content(z_order: i32) -> Self {
        Self {
            z_order,
            layer: Layer::Content,
        }
    }

    pub const fn blocker(z_order: i32) -> Self {
        Self {
            z_order,
            layer: Layer::Blocker,
        }
    }
}

/// Handle of a touch-blocking overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockerId(pub u64);

//=== Canvas Trait ========================================================

/// Scene-graph operations the UI manager needs.
pub trait Canvas {
    /// Adds `node` as a child at `order`, after existing equal orders.
    fn attach(&mut self, node: NodeId, order: SiblingOrder);
    /// Removes `node` from the canvas without destroying it.
    fn detach(&mut self, node: NodeId);
    fn destroy(&mut self, node: NodeId);
    fn set_active(&mut self, node: NodeId, active: bool);
    /// Creates a full-screen overlay swallowing touches.
    fn create_blocker(&mut self, order: SiblingOrder, tint: Option<Color>) -> BlockerId;
    fn destroy_blocker(&mut self, blocker: BlockerId);
    /// Routes taps on the node's background to the manager's
    /// `on_background_tap(key)`.
    fn bind_quick_close(&mut self, node: NodeId, key: ViewKey);
}

//=== HeadlessCanvas ======================================================

/// A canvas child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    Node(NodeId),
    Blocker(BlockerId),
}

#[derive(Default)]
struct CanvasState {
    children: Vec<(SiblingOrder, Child)>,
    active: HashMap<NodeId, bool>,
    destroyed: HashSet<NodeId>,
    blockers: HashMap<BlockerId, Option<Color>>,
    quick_close: HashMap<NodeId, ViewKey>,
    next_blocker: u64,
}

impl CanvasState {
    fn insert(&mut self, order: SiblingOrder, child: Child) {
        let at = self.children.partition_point(|(existing, _)| *existing <= order);
        self.children.insert(at, (order, child));
    }

    fn remove(&mut self, child: Child) -> bool {
        let before = self.children.len();
        self.children.retain(|(_, existing)| *existing != child);
        self.children.len() != before
    }
}

/// In-memory canvas recording every operation.
///
/// Clones share state, so tests keep a handle after giving one to the
/// manager.
#[derive(Clone, Default)]
pub struct HeadlessCanvas {
    state: Rc<RefCell<CanvasState>>,
}

impl HeadlessCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children in sibling order, bottom first.
    pub fn children(&self) -> Vec<Child> {
        self.state
            .borrow()
            .children
            .iter()
            .map(|(_, child)| *child)
            .collect()
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.state
            .borrow()
            .children
            .iter()
            .any(|(_, child)| *child == Child::Node(node))
    }

    /// Last activation state set for `node`.
    pub fn is_active(&self, node: NodeId) -> Option<bool> {
        self.state.borrow().active.get(&node).copied()
    }

    pub fn is_destroyed(&self, node: NodeId) -> bool {
        self.state.borrow().destroyed.contains(&node)
    }

    pub fn destroyed_count(&self) -> usize {
        self.state.borrow().destroyed.len()
    }

    /// Number of live blockers.
    pub fn blocker_count(&self) -> usize {
        self.state.borrow().blockers.len()
    }

    pub fn blocker_tint(&self, blocker: BlockerId) -> Option<Color> {
        self.state.borrow().blockers.get(&blocker).copied().flatten()
    }

    /// Simulates a tap on a node's background; returns the key to pass
    /// to the manager, if quick close is bound.
    pub fn tap_background(&self, node: NodeId) -> Option<ViewKey> {
        self.state.borrow().quick_close.get(&node).copied()
    }
}

impl Canvas for HeadlessCanvas {
    fn attach(&mut self, node: NodeId, order: SiblingOrder) {
        let mut state = self.state.borrow_mut();
        if state.destroyed.contains(&node) {
            warn!("attach of destroyed node {:?} ignored", node);
            return;
        }
        state.remove(Child::Node(node));
        state.insert(order, Child::Node(node));
    }

    fn detach(&mut self, node: NodeId) {
        self.state.borrow_mut().remove(Child::Node(node));
    }

    fn destroy(&mut self, node: NodeId) {
        let mut state = self.state.borrow_mut();
        state.remove(Child::Node(node));
        state.active.remove(&node);
        state.quick_close.remove(&node);
        if !state.destroyed.insert(node) {
            warn!("node {:?} destroyed twice", node);
        }
    }

    fn set_active(&mut self, node: NodeId, active: bool) {
        self.state.borrow_mut().active.insert(node, active);
    }

    fn create_blocker(&mut self, order: SiblingOrder, tint: Option<Color>) -> BlockerId {
        let mut state = self.state.borrow_mut();
        state.next_blocker += 1;
        let blocker = BlockerId(state.next_blocker);
        state.blockers.insert(blocker, tint);
        state.insert(order, Child::Blocker(blocker));
        debug!("blocker {:?} created at {:?}", blocker, order);
        blocker
    }

    fn destroy_blocker(&mut self, blocker: BlockerId) {
        let mut state = self.state.borrow_mut();
        state.blockers.remove(&blocker);
        state.remove(Child::Blocker(blocker));
    }

    fn bind_quick_close(&mut self, node: NodeId, key: ViewKey) {
        self.state.borrow_mut().quick_close.insert(node, key);
    }
}

//=========================================================================
// Tests
//=========================================================================
