//! Channel traits: the boundary between a session and the outside world.
//!
//! An [`InputChannel`] produces user messages (typed text or speech
//! transcripts). An [`OutputChannel`] renders replies (console print, speech
//! synthesis, avatar playback) and reports when rendering has finished.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ChannelError;

/// Where a user message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputOrigin {
    Typed,
    Speech,
}

/// A single user message delivered by an input channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    pub text: String,
    pub origin: InputOrigin,
}

impl UserInput {
    pub fn typed(text: impl Into<String>) -> Self {
        Self { text: text.into(), origin: InputOrigin::Typed }
    }

    pub fn speech(text: impl Into<String>) -> Self {
        Self { text: text.into(), origin: InputOrigin::Speech }
    }
}

/// Produces user messages.
#[async_trait]
pub trait InputChannel: Send + Sync {
    /// Human-readable channel name (e.g., "stdin").
    fn name(&self) -> &str;

    /// Start listening. The returned receiver closes when input ends.
    async fn start(
        &self,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<UserInput>, ChannelError>;
}

/// Renders replies.
///
/// `speak` resolves when playback has completed, so the session can hold the
/// `Speaking` state for exactly as long as the output takes.
#[async_trait]
pub trait OutputChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn speak(&self, text: &str) -> std::result::Result<(), ChannelError>;
}
