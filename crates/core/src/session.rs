//! Session lifecycle states and turn-taking policies.

use serde::{Deserialize, Serialize};

/// What an active session is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivePhase {
    Listening,
    Generating,
    Speaking,
}

/// Lifecycle of one conversation.
///
/// `Idle → Connecting → Active(Listening ⇄ Generating → Speaking) → Ended`.
/// `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "phase")]
pub enum SessionState {
    Idle,
    Connecting,
    Active(ActivePhase),
    Ended,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    /// True while a generation or its playback occupies the session.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Active(ActivePhase::Generating | ActivePhase::Speaking)
        )
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Connecting => f.write_str("connecting"),
            SessionState::Active(ActivePhase::Listening) => f.write_str("active/listening"),
            SessionState::Active(ActivePhase::Generating) => f.write_str("active/generating"),
            SessionState::Active(ActivePhase::Speaking) => f.write_str("active/speaking"),
            SessionState::Ended => f.write_str("ended"),
        }
    }
}

/// How a session was initiated. Voice sessions open with a greeting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Text,
    Voice,
}

/// What happens to input that arrives while a turn is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptPolicy {
    /// Hold it and process it after the current turn completes.
    #[default]
    Queue,
    /// Refuse it and emit an `InputRejected` event.
    Reject,
}

/// Ordering of queued input under [`InterruptPolicy::Queue`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOrdering {
    /// Process every queued message in arrival order.
    #[default]
    Fifo,
    /// Keep a single pending slot; a newer message replaces the older one.
    LatestWins,
}
