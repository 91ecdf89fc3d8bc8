//! Broadcast-based event emitter for [`EngineEvent`] dispatch.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use vox_core::events::EngineEvent;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers will be dropped
/// (lagged) rather than blocking the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<EngineEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Non-blocking.
    ///
    /// Returns the number of receivers that received the event.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total events emitted.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use vox_core::events::session_complete_event;

    #[test]
    fn emit_with_no_subscribers() {
        let emitter = EventEmitter::new();
        let count = emitter.emit(session_complete_event("s1"));
        assert_eq!(count, 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn emit_and_receive() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let count = emitter.emit(session_complete_event("s1"));
        assert_eq!(count, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id(), "s1");
        assert_eq!(received.event_type(), "session_complete");
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let emitter = EventEmitter::new();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);

        let count = emitter.emit(session_complete_event("s1"));
        assert_eq!(count, 2);
        assert_eq!(rx1.recv().await.unwrap().session_id(), "s1");
        assert_eq!(rx2.recv().await.unwrap().session_id(), "s1");
    }

    #[tokio::test]
    async fn dropped_slow_receiver() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();

        let _ = emitter.emit(session_complete_event("s1"));
        let _ = emitter.emit(session_complete_event("s2"));
        let _ = emitter.emit(session_complete_event("s3"));

        // Receiver should be lagged.
        let result = rx.recv().await;
        assert!(result.is_err());
    }
}
