use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Notable transitions published by the session runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionEvent {
    ModelLoadStarted { path: String },
    ModelLoaded { path: String },
    ModelLoadFailed { path: String, message: String },
    GenerationStarted { request_id: String },
    GenerationFinished { request_id: String, tokens: u64 },
    GenerationFailed { request_id: String, message: String },
    CancelRequested { request_id: String },
    /// An intent was refused in the current state; nothing changed.
    IntentRejected { reason: String },
    SessionCleared,
    Shutdown,
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::SessionCleared);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::SessionCleared));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(SessionEvent::Shutdown);

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, SessionEvent::Shutdown));
        assert!(matches!(e2, SessionEvent::Shutdown));
    }

    #[tokio::test]
    async fn model_load_events_keep_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::ModelLoadStarted {
            path: "m.bin".into(),
        });
        bus.publish(SessionEvent::ModelLoaded {
            path: "m.bin".into(),
        });

        let e1 = rx.recv().await.unwrap();
        assert!(matches!(e1, SessionEvent::ModelLoadStarted { ref path } if path == "m.bin"));

        let e2 = rx.recv().await.unwrap();
        assert!(matches!(e2, SessionEvent::ModelLoaded { ref path } if path == "m.bin"));
    }

    #[tokio::test]
    async fn generation_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SessionEvent::GenerationStarted {
            request_id: "abcd1234".into(),
        });
        bus.publish(SessionEvent::GenerationFailed {
            request_id: "abcd1234".into(),
            message: "backend error: out of memory".into(),
        });

        let e1 = rx.recv().await.unwrap();
        assert!(
            matches!(e1, SessionEvent::GenerationStarted { ref request_id } if request_id == "abcd1234")
        );

        let e2 = rx.recv().await.unwrap();
        assert!(
            matches!(e2, SessionEvent::GenerationFailed { ref message, .. } if message.contains("out of memory"))
        );
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        let count = bus.publish(SessionEvent::Shutdown);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn publish_returns_subscriber_count() {
        let bus = EventBus::new(16);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        let _rx3 = bus.subscribe();

        let count = bus.publish(SessionEvent::SessionCleared);
        assert_eq!(count, 3);
    }

    #[test]
    fn unknown_event_deserializes() {
        let json = r#"{"type":"SomeNewEventWeNeverHeardOf","data":null}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, SessionEvent::Unknown));
    }
}
