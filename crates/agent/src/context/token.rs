//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 bytes per token. Close enough for
//! BPE tokenizers on English text, and predictable in tests.

use parley_core::message::ConversationTurn;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a rendered history line (`"User: ..."` plus newline).
pub fn estimate_turn_tokens(turn: &ConversationTurn) -> usize {
    estimate_tokens(turn.role.label()) + estimate_tokens(&turn.content) + 1
}
