//! Conversation engine for Parley.
//!
//! - [`context`]: prompt synthesis under a token budget
//! - [`normalizer`]: trims generated text to a short spoken reply
//! - [`engine`]: retrieval → prompt → generation → normalization for one turn
//! - [`session`]: the turn-taking state machine around the engine

pub mod context;
pub mod engine;
pub mod normalizer;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use context::{Prompt, PromptError, PromptSynthesizer};
pub use engine::{Answer, ReplyOrigin, TurnEngine, TurnError, TurnReply};
pub use normalizer::{ResponseNormalizer, normalize};
pub use session::{
    ConversationSession, InputDisposition, SessionHandle, SessionOptions, SessionSnapshot,
};
