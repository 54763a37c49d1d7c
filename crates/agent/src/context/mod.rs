//! Prompt assembly under a token budget.
//!
//! The persona template is filled from five inputs: persona fields, rules,
//! retrieved context, conversation history and the new message. When the
//! result is over budget the oldest history turns go first; retrieved
//! context is never trimmed.

pub mod prompt;
pub mod token;

pub use prompt::{DEFAULT_BUDGET_TOKENS, Prompt, PromptError, PromptSynthesizer};
pub use token::estimate_tokens;
