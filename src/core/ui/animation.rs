//=========================================================================
// UI Animation
//=========================================================================
//
// Open / close animation contract.
//
// The manager hands the animator a one-shot `AnimationDone`; the open or
// close sequence continues once it completes. Dropping it uncompleted
// counts as completion, so a view without animations never stalls the
// manager.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

//=== Internal Dependencies ===============================================

use super::view::NodeId;

//=== Contract ============================================================

/// Which animation to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationClip {
    Open,
    Close,
}

/// Plays UI animations.
pub trait UiAnimator {
    fn play(&mut self, node: NodeId, clip: AnimationClip, done: AnimationDone);
}

type DoneCallback = Box<dyn FnOnce() + Send>;

/// One-shot completion handle for an animation.
pub struct AnimationDone {
    callback: Option<DoneCallback>,
}

impl AnimationDone {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn complete(mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl Drop for AnimationDone {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback();
        }
    }
}

impl fmt::Debug for AnimationDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationDone")
            .field("completed", &self.callback.is_none())
            .finish()
    }
}

//=== Headless Animators ==================================================

/// Completes every animation immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateAnimator;

impl UiAnimator for ImmediateAnimator {
    fn play(&mut self, _node: NodeId, _clip: AnimationClip, done: AnimationDone) {
        done.complete();
    }
}

/// Holds animations until finished explicitly.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct ManualAnimator {
    playing: Rc<RefCell<VecDeque<(NodeId, AnimationClip, AnimationDone)>>>,
}

impl ManualAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Animations currently playing, oldest first.
    pub fn playing(&self) -> Vec<(NodeId, AnimationClip)> {
        self.playing
            .borrow()
            .iter()
            .map(|(node, clip, _)| (*node, *clip))
            .collect()
    }

    /// Finishes the oldest animation. Returns false if none was playing.
    pub fn finish_next(&self) -> bool {
        let next = self.playing.borrow_mut().pop_front();
        match next {
            Some((_, _, done)) => {
                done.complete();
                true
            }
            None => false,
        }
    }

    pub fn finish_all(&self) -> usize {
        let mut finished = 0;
        while self.finish_next() {
            finished += 1;
        }
        finished
    }
}

impl UiAnimator for ManualAnimator {
    fn play(&mut self, node: NodeId, clip: AnimationClip, done: AnimationDone) {
        self.playing.borrow_mut().push_back((node, clip, done));
    }
}

//=========================================================================
// Tests
//=========================================================================
