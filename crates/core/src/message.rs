//! Conversation turns and the append-only session history.
//!
//! A user speaks → the session answers → the next user turn follows. The
//! only exception to strict alternation is a greeting the assistant injects
//! before the user has said anything.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when a turn is rendered into a prompt transcript.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One entry in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Turn {index} repeats role '{role}'; roles must alternate")]
    RepeatedRole { index: usize, role: String },

    #[error("A greeting can only open an empty history")]
    GreetingNotFirst,

    #[error("An assistant reply needs a preceding user turn")]
    ReplyWithoutPrompt,
}

/// Ordered, append-only sequence of turns with the alternation invariant
/// enforced on every append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<ConversationTurn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from untrusted turns (e.g. an HTTP payload),
    /// validating alternation. A leading assistant turn is accepted as a greeting.
    pub fn from_turns(turns: Vec<ConversationTurn>) -> Result<Self, HistoryError> {
        for (index, pair) in turns.windows(2).enumerate() {
            if pair[0].role == pair[1].role {
                return Err(HistoryError::RepeatedRole {
                    index: index + 1,
                    role: pair[1].role.label().to_lowercase(),
                });
            }
        }
        Ok(Self { turns })
    }

    /// Inject the assistant's opening line. Only valid on an empty history.
    pub fn greet(&mut self, text: impl Into<String>) -> Result<(), HistoryError> {
        if !self.turns.is_empty() {
            return Err(HistoryError::GreetingNotFirst);
        }
        self.turns.push(ConversationTurn::assistant(text));
        Ok(())
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> Result<(), HistoryError> {
        if self.last_role() == Some(Role::User) {
            return Err(HistoryError::RepeatedRole {
                index: self.turns.len(),
                role: "user".into(),
            });
        }
        self.turns.push(ConversationTurn::user(text));
        Ok(())
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> Result<(), HistoryError> {
        match self.last_role() {
            None => Err(HistoryError::ReplyWithoutPrompt),
            Some(Role::Assistant) => Err(HistoryError::RepeatedRole {
                index: self.turns.len(),
                role: "assistant".into(),
            }),
            Some(Role::User) => {
                self.turns.push(ConversationTurn::assistant(text));
                Ok(())
            }
        }
    }

    /// Record a completed exchange. Fails without side effects if the user
    /// turn would break alternation.
    pub fn push_exchange(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Result<(), HistoryError> {
        self.push_user(user)?;
        self.turns.push(ConversationTurn::assistant(assistant));
        Ok(())
    }

    pub fn last_role(&self) -> Option<Role> {
        self.turns.last().map(|t| t.role)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `n` turns (or all of them if fewer exist).
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn into_turns(self) -> Vec<ConversationTurn> {
        self.turns
    }
}
