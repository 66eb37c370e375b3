//=========================================================================
// UI Requests
//=========================================================================
//
// Open / close requests and the FIFO queues that hold them while the
// manager is busy.
//
// Requests are queued whenever an open or close is in flight. The
// manager drains them one at a time when it returns to Idle, closes
// before opens.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::VecDeque;
use std::fmt;

//=== Internal Dependencies ===============================================

use super::descriptor::UiId;
use super::view::ViewKey;
use crate::core::assets::ProgressFn;
use crate::core::value::ArgValue;

//=== Requests ============================================================

/// Which UI a close applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTarget {
    /// Whatever is on top when the close runs.
    Top,
    /// A specific instance.
    View(ViewKey),
}

/// A deferred `open` call.
#[derive(Clone)]
pub struct OpenRequest {
    pub id: UiId,
    pub args: Vec<ArgValue>,
    pub progress: Option<ProgressFn>,
    /// Overrides the descriptor's z-order for this instance.
    pub z_order: Option<i32>,
    /// Instance key, assigned when the request is accepted.
    pub(crate) key: Option<ViewKey>,
}

impl OpenRequest {
    pub fn new(id: UiId, args: Vec<ArgValue>) -> Self {
        Self {
            id,
            args,
            progress: None,
            z_order: None,
            key: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = Some(z_order);
        self
    }
}

impl fmt::Debug for OpenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRequest")
            .field("id", &self.id)
            .field("args", &self.args)
            .field("progress", &self.progress.is_some())
            .field("z_order", &self.z_order)
            .field("key", &self.key)
            .finish()
    }
}

/// Request issued by a view from inside a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Open { id: UiId, args: Vec<ArgValue> },
    Close(CloseTarget),
}

//=== RequestQueue ========================================================

/// FIFO queue of pending requests.
pub(crate) struct RequestQueue<T> {
    queue: VecDeque<T>,
}

impl<T> RequestQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub(crate) fn push(&mut self, request: T) {
        self.queue.push_back(request);
    }

    pub(crate) fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }

    /// Keeps only the requests matching `keep`; returns how many were removed.
    pub(crate) fn retain<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&T) -> bool,
    {
        let before = self.queue.len();
        self.queue.retain(keep);
        before - self.queue.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo() {
        let mut queue = RequestQueue::new();
        queue.push(OpenRequest::new(1, Vec::new()));
        queue.push(OpenRequest::new(2, Vec::new()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(queue.pop().map(|r| r.id), Some(1));
        assert_eq!(queue.pop().map(|r| r.id), Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn retain_reports_removed() {
        let mut queue = RequestQueue::new();
        for id in [1, 2, 1] {
            queue.push(OpenRequest::new(id, Vec::new()));
        }

        assert_eq!(queue.retain(|request| request.id != 1), 2);
        assert_eq!(queue.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn builders_set_overrides() {
        let request = OpenRequest::new(4, Vec::new()).with_z_order(401);
        assert_eq!(request.z_order, Some(401));
        assert!(request.progress.is_none());
        assert!(request.key.is_none());
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = RequestQueue::new();
        queue.push(CloseTarget::Top);
        queue.clear();
        assert!(queue.is_empty());
    }
}
