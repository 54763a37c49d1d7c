//! Prompt Synthesizer: fills the persona template.
//!
//! Substitution is a single left-to-right pass: each `{field}` is replaced
//! by its value and the value is never scanned again, so a message that
//! itself contains `{context}` stays literal. Placeholders with no matching
//! field are copied through unchanged.

use parley_core::knowledge::RetrievalResult;
use parley_core::message::ConversationTurn;
use parley_core::persona::Persona;
use thiserror::Error;
use tracing::debug;

use super::token::{estimate_tokens, estimate_turn_tokens};

/// Default prompt budget, well under the input window of small local models.
pub const DEFAULT_BUDGET_TOKENS: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    /// Persona, context and message alone exceed the budget.
    #[error("Prompt needs ~{needed} tokens without history, budget is {budget}")]
    BudgetExceeded { needed: usize, budget: usize },
}

/// A synthesized prompt and how it was fitted to the budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub estimated_tokens: usize,
    /// History turns included.
    pub history_turns: usize,
    /// Oldest history turns left out to fit the budget.
    pub dropped_turns: usize,
}

#[derive(Debug, Clone)]
pub struct PromptSynthesizer {
    budget_tokens: usize,
}

impl Default for PromptSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_TOKENS)
    }
}

impl PromptSynthesizer {
    pub fn new(budget_tokens: usize) -> Self {
        Self { budget_tokens }
    }

    pub fn budget_tokens(&self) -> usize {
        self.budget_tokens
    }

    /// Build the prompt for `message`.
    ///
    /// Pure: identical inputs yield a byte-identical prompt.
    pub fn synthesize(
        &self,
        persona: &Persona,
        context: &[RetrievalResult],
        history: &[ConversationTurn],
        message: &str,
    ) -> Result<Prompt, PromptError> {
        let mut fields = Fields {
            persona: &persona.name,
            role: &persona.role,
            traits: persona.traits.join(", "),
            rules: persona.rules.join(". "),
            context: render_context(context),
            history: String::new(),
            message,
        };

        let mut dropped = 0;
        loop {
            let kept = &history[dropped..];
            fields.history = render_history(kept);
            let text = substitute(&persona.template, &fields);
            let estimated_tokens = estimate_tokens(&text);

            if estimated_tokens <= self.budget_tokens {
                if dropped > 0 {
                    let tokens_dropped: usize =
                        history[..dropped].iter().map(estimate_turn_tokens).sum();
                    debug!(
                        dropped,
                        tokens_dropped,
                        kept = kept.len(),
                        budget = self.budget_tokens,
                        "Prompt over budget, dropped oldest history turns"
                    );
                }
                return Ok(Prompt {
                    text,
                    estimated_tokens,
                    history_turns: kept.len(),
                    dropped_turns: dropped,
                });
            }

            if kept.is_empty() {
                return Err(PromptError::BudgetExceeded {
                    needed: estimated_tokens,
                    budget: self.budget_tokens,
                });
            }
            dropped += 1;
        }
    }
}

struct Fields<'a> {
    persona: &'a str,
    role: &'a str,
    traits: String,
    rules: String,
    context: String,
    history: String,
    message: &'a str,
}

impl Fields<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "persona" => Some(self.persona),
            "role" => Some(self.role),
            "traits" => Some(&self.traits),
            "rules" => Some(&self.rules),
            "context" => Some(&self.context),
            "history" => Some(&self.history),
            "message" => Some(self.message),
            _ => None,
        }
    }
}

/// One line per hit: `[source_id] text`.
fn render_context(context: &[RetrievalResult]) -> String {
    context
        .iter()
        .map(|r| format!("[{}] {}", r.source_id(), r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.label(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn substitute(template: &str, fields: &Fields<'_>) -> String {
    let mut out = String::with_capacity(template.len() + fields.context.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let name = &after[..close];

        if name.contains('{') {
            // "{{persona}": emit the stray brace, retry from the next one.
            out.push('{');
            rest = after;
            continue;
        }

        match fields.get(name) {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}
