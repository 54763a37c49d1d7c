//! Domain event system: decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in the system.
//! Every fallback, rejection and failure has at least one event here so no
//! error disappears without an observable side effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::session::SessionState;

/// Why an utterance was dispatched to the output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtteranceKind {
    Greeting,
    Reply,
    Fallback,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session moved between lifecycle states
    SessionStateChanged {
        session_id: String,
        from: SessionState,
        to: SessionState,
        timestamp: DateTime<Utc>,
    },

    /// Input arrived while busy and was queued
    InputQueued {
        session_id: String,
        pending: usize,
        timestamp: DateTime<Utc>,
    },

    /// Input was refused (reject policy, full queue, or ended session)
    InputRejected {
        session_id: String,
        reason: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// A queued input was replaced by a newer one (latest-wins ordering)
    InputSuperseded {
        session_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// Text was handed to the output channel
    UtteranceDispatched {
        session_id: String,
        kind: UtteranceKind,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A generation call failed or timed out
    GenerationFailed {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The output channel failed to render an utterance
    OutputFailed {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A corpus was indexed
    KnowledgeIndexed {
        fragments: usize,
        chunks: usize,
        rejected_sources: usize,
        timestamp: DateTime<Utc>,
    },

    /// A one-shot answer was served
    AnswerServed {
        source_id: String,
        confidence: u8,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components can subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shorten user text for event payloads.
pub fn preview(text: &str) -> String {
    const MAX: usize = 48;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
