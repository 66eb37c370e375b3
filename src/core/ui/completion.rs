//=========================================================================
// Completion Collector
//=========================================================================
//
// Delivers asynchronous completions (asset loads, animations) back to the
// UI manager.
//
// Architecture:
//   LoadDone / AnimationDone ─→ Sender<Completion> ─→ collect() → manager
//
// Completions never call into the manager directly; they are drained at
// well-defined points, so requests arriving in between are queued rather
// than interleaved. Draining is bounded per call to prevent starvation.
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use log::warn;

//=== Internal Dependencies ===============================================

use super::animation::AnimationDone;
use crate::core::assets::{AssetHandle, LoadDone, LoadError};

/// Identifies one in-flight asynchronous step.
pub(crate) type Ticket = u64;

//=== Completion ==========================================================

pub(crate) enum Completion {
    AssetLoaded {
        ticket: Ticket,
        result: Result<AssetHandle, LoadError>,
    },
    AnimationFinished {
        ticket: Ticket,
    },
}

//=== CompletionCollector =================================================

pub(crate) struct CompletionCollector {
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
    next_ticket: Ticket,
}

impl CompletionCollector {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            next_ticket: 0,
        }
    }

    pub(crate) fn next_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        self.next_ticket
    }

    /// Completion handle for a load identified by `ticket`.
    pub(crate) fn load_done(&self, ticket: Ticket, path: &str) -> LoadDone {
        let sender = self.sender.clone();
        LoadDone::new(path, move |result| {
            // The manager owns the receiver; a failed send means it is gone.
            let _ = sender.send(Completion::AssetLoaded { ticket, result });
        })
    }

    /// Completion handle for an animation identified by `ticket`.
    pub(crate) fn animation_done(&self, ticket: Ticket) -> AnimationDone {
        let sender = self.sender.clone();
        AnimationDone::new(move || {
            let _ = sender.send(Completion::AnimationFinished { ticket });
        })
    }

    /// Takes pending completions, at most `MAX_COMPLETIONS_PER_PUMP`.
    pub(crate) fn collect(&mut self) -> Vec<Completion> {
        const MAX_COMPLETIONS_PER_PUMP: usize = 100;

        let mut completions = Vec::new();
        while completions.len() < MAX_COMPLETIONS_PER_PUMP {
            match self.receiver.try_recv() {
                Ok(completion) => completions.push(completion),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if completions.len() >= MAX_COMPLETIONS_PER_PUMP {
            warn!(
                "Completion backlog: drained {} completions this pump",
                completions.len()
            );
        }

        completions
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::SharedAsset;
    use std::sync::Arc;

    #[test]
    fn collect_handles_empty_channel() {
        let mut collector = CompletionCollector::new();
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn tickets_are_unique() {
        let mut collector = CompletionCollector::new();
        let first = collector.next_ticket();
        assert_ne!(first, collector.next_ticket());
    }

    #[test]
    fn completions_arrive_in_order() {
        let mut collector = CompletionCollector::new();
        let asset: AssetHandle = Arc::new(SharedAsset::new("ui/bag"));

        collector.load_done(1, "ui/bag").complete(Ok(asset));
        collector.animation_done(2).complete();

        let completions = collector.collect();
        assert_eq!(completions.len(), 2);
        assert!(matches!(
            &completions[0],
            Completion::AssetLoaded { ticket: 1, result: Ok(_) }
        ));
        assert!(matches!(
            completions[1],
            Completion::AnimationFinished { ticket: 2 }
        ));
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn dropped_handles_still_complete() {
        let mut collector = CompletionCollector::new();
        drop(collector.load_done(7, "ui/head"));
        drop(collector.animation_done(8));

        let completions = collector.collect();
        assert!(matches!(
            &completions[0],
            Completion::AssetLoaded { ticket: 7, result: Err(LoadError::Abandoned { .. }) }
        ));
        assert!(matches!(
            completions[1],
            Completion::AnimationFinished { ticket: 8 }
        ));
    }

    #[test]
    fn collect_is_bounded() {
        let mut collector = CompletionCollector::new();
        for ticket in 0..150 {
            collector.animation_done(ticket).complete();
        }

        assert_eq!(collector.collect().len(), 100);
        assert_eq!(collector.collect().len(), 50);
    }
}
