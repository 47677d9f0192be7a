//! Server-sent change notifications.

use axum::response::sse::Event;
use tokio::sync::broadcast;

/// Events pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// Keep-alive, sent every tick
    Ping,

    /// A rebuild finished for sources modified at `timestamp` (unix seconds)
    BuildComplete { timestamp: u64 },
}

impl LiveEvent {
    /// Event name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::Ping => "ping",
            LiveEvent::BuildComplete { .. } => "buildComplete",
        }
    }

    /// JSON data line, if the event carries one.
    pub fn payload(&self) -> Option<String> {
        match self {
            LiveEvent::Ping => None,
            LiveEvent::BuildComplete { timestamp } => {
                Some(serde_json::json!({ "timestamp": timestamp }).to_string())
            }
        }
    }

    /// Convert into an axum SSE event.
    pub fn to_sse(&self) -> Event {
        let event = Event::default().event(self.name());
        match self.payload() {
            Some(data) => event.data(data),
            None => event,
        }
    }
}

/// Hub for broadcasting live events to all connected clients.
#[derive(Debug, Clone)]
pub struct LiveHub {
    sender: broadcast::Sender<LiveEvent>,
}

impl LiveHub {
    /// Create a new hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send an event to all connected clients.
    pub fn send(&self, event: LiveEvent) {
        // No receivers is fine: nobody has the page open yet.
        let _ = self.sender.send(event);
    }

    /// Subscribe to live events.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new()
    }
}
