use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SessionCleared,
    /// Events published by other modules; the session core ignores them.
    Other(String),
}

/// Process-wide publish/subscribe channel for lifecycle signals.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error for a fire-and-forget bus.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(SessionEvent::Other("DATASET_CREATED".to_string()));
        bus.emit(SessionEvent::SessionCleared);

        assert_eq!(
            a.recv().await.unwrap(),
            SessionEvent::Other("DATASET_CREATED".to_string())
        );
        assert_eq!(a.recv().await.unwrap(), SessionEvent::SessionCleared);
        assert_eq!(
            b.recv().await.unwrap(),
            SessionEvent::Other("DATASET_CREATED".to_string())
        );
    }

    #[test]
    fn emit_without_subscribers_is_harmless() {
        EventBus::new().emit(SessionEvent::SessionCleared);
    }
}
