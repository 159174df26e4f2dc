//! Pipeline events: observe calls without sitting in the advisor chain.
//!
//! The client publishes an event when a response is produced, a tool runs,
//! a tool round completes or a call fails. Subscribers filter for what
//! they care about; publishing with no subscribers is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All pipeline events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// A terminal response was produced
    ResponseGenerated {
        conversation_id: Option<String>,
        model: String,
        tokens_used: u32,
        tool_rounds: u32,
        streamed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed on the model's behalf
    ToolExecuted {
        tool_name: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// One tool round (all calls of one tool-call response) finished
    ToolRoundCompleted {
        round: u32,
        calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A call failed
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<PipelineEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.sender.subscribe()
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

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(PipelineEvent::ToolRoundCompleted {
            round: 2,
            calls: 3,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            PipelineEvent::ToolRoundCompleted { round, calls, .. } => {
                assert_eq!(*round, 2);
                assert_eq!(*calls, 3);
            }
            other => panic!("Expected ToolRoundCompleted, got {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new(16);
        bus.publish(PipelineEvent::ErrorOccurred {
            context: "test".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
