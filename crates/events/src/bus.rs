//! Broadcast bus carrying lifecycle events to any number of observers.

use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out channel for lifecycle events.
///
/// Cloning is cheap and clones share the channel. Publishing never blocks:
/// with no subscribers the event is dropped, and a subscriber that falls
/// more than the channel capacity behind loses the oldest events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Wrap `event` in an envelope (fresh id + timestamp) and broadcast it.
    ///
    /// Returns how many subscribers received it.
    pub fn emit(&self, event: Event) -> usize {
        self.publish(EventEnvelope::new(event))
    }

    /// Broadcast an already-enveloped event.
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Open a subscription; only events published after this call arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn phase_event(phase: &str) -> Event {
        Event::PhaseStarted {
            operation_id: Uuid::new_v4(),
            phase: phase.to_string(),
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let delivered = bus.emit(phase_event("handler"));
        assert_eq!(delivered, 1);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.phase(), Some("handler"));
        assert!(!envelope.id.is_nil());
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.emit(phase_event("start_tx")), 2);
        assert_eq!(bus.emit(phase_event("end_tx")), 2);

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(rx.recv().await.unwrap().event.phase(), Some("start_tx"));
            assert_eq!(rx.recv().await.unwrap().event.phase(), Some("end_tx"));
        }
    }

    #[tokio::test]
    async fn test_without_subscribers_events_are_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(phase_event("handler")), 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.emit(phase_event("pre_handler"));

        let mut rx = bus.subscribe();
        bus.emit(phase_event("handler"));

        assert_eq!(rx.recv().await.unwrap().event.phase(), Some("handler"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clones_share_the_channel() {
        let bus = EventBus::with_capacity(8);
        let clone = bus.clone();

        let _rx = clone.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.capacity(), 8);
        assert_eq!(clone.capacity(), 8);
    }
}
