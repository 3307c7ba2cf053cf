//! Event emission to the host (spec §6), mirroring the teacher's
//! daemon-level event bus: an in-process broadcast channel plus a
//! monotonic sequence counter hosts can poll for "has anything changed
//! since I last looked" (SPEC_FULL §10.5).

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use interactsh_types::EngineEvent;

/// Broadcasts [`EngineEvent`]s emitted by the manager to every subscribed
/// host tab.
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Emit an event to every current subscriber. A send with no
    /// subscribers is not an error — the host may not be listening yet.
    pub fn emit(&self, event: EngineEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_increments_sequence_and_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(EngineEvent::DataChanged);
        assert_eq!(bus.sequence(), 1);
        assert_eq!(rx.try_recv().expect("event delivered"), EngineEvent::DataChanged);
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.emit(EngineEvent::UrlsChanged);
        assert_eq!(bus.sequence(), 1);
    }
}
