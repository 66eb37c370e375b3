//=========================================================================
// Deferred Values
//=========================================================================
//
// Single-threaded promise used by lifecycle hooks and computed targets.
//
// Architecture:
//   deferred() ──→ (Resolver<T>, Deferred<T>)
//                      │              │
//   resolve()/reject() ┘              └→ try_settle() polled by the machine
//
// Backed by a one-slot crossbeam channel. Dropping the resolver without
// settling is observable as `Settlement::Abandoned`.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

//=== Public API ==========================================================

/// Creates a connected resolver / deferred pair.
pub fn deferred<T>() -> (Resolver<T>, Deferred<T>) {
    let (sender, receiver) = bounded(1);
    (Resolver { sender }, Deferred { receiver })
}

/// Current state of a [`Deferred`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// Not settled yet.
    Pending,
    /// Settled with a value or a rejection reason.
    Ready(Result<T, String>),
    /// The resolver was dropped without settling.
    Abandoned,
}

//=== Resolver ============================================================

/// Settling half of a deferred value. Consumed on use.
pub struct Resolver<T> {
    sender: Sender<Result<T, String>>,
}

impl<T> Resolver<T> {
    /// Settles the deferred successfully.
    pub fn resolve(self, value: T) {
        // The receiving side may already be gone; nothing to report then.
        let _ = self.sender.send(Ok(value));
    }

    /// Settles the deferred with a failure.
    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.sender.send(Err(reason.into()));
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

//=== Deferred ============================================================

/// Awaitable half of a deferred value.
pub struct Deferred<T> {
    receiver: Receiver<Result<T, String>>,
}

impl<T> Deferred<T> {
    /// Creates a deferred that is already resolved.
    pub fn resolved(value: T) -> Self {
        let (resolver, deferred) = deferred();
        resolver.resolve(value);
        deferred
    }

    /// Creates a deferred that is already rejected.
    pub fn rejected(reason: impl Into<String>) -> Self {
        let (resolver, deferred) = deferred();
        resolver.reject(reason);
        deferred
    }

    /// Checks for a settlement without blocking.
    ///
    /// A `Ready` settlement is returned exactly once; later calls report
    /// `Abandoned` because the slot has been consumed.
    pub fn try_settle(&self) -> Settlement<T> {
        match self.receiver.try_recv() {
            Ok(result) => Settlement::Ready(result),
            Err(TryRecvError::Empty) => Settlement::Pending,
            Err(TryRecvError::Disconnected) => Settlement::Abandoned,
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("settled", &!self.receiver.is_empty())
            .finish()
    }
}

//=========================================================================
// Tests
//=========================================================================
