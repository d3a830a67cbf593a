use crate::types::InstanceEvent;

/// Event bus using tokio broadcast channel.
/// All subscribers receive all lifecycle events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<InstanceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: InstanceEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<InstanceEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventType, InstanceId, ProcessInfo};

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(InstanceEvent::new(
            InstanceId::from_str("i-1"),
            EventType::StartEvent,
            ProcessInfo {
                start_event: Some("S".into()),
                ..Default::default()
            },
            None,
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::StartEvent);
        assert_eq!(event.element_id(), Some("S"));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(InstanceEvent::new(
            InstanceId::new(),
            EventType::EndEvent,
            ProcessInfo::default(),
            None,
        ));
    }
}
