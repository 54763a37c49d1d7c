//! Turn engine: one question in, one spoken-length reply out.
//!
//! Wraps Retriever → Prompt Synthesizer → generative backend → Response
//! Normalizer. [`TurnEngine::respond`] reports failures to its caller (the
//! session maps them to a fallback utterance); [`TurnEngine::answer`] is the
//! one-shot entry point and never fails.

use std::sync::Arc;
use std::time::Duration;

use parley_config::AppConfig;
use parley_core::error::{KnowledgeError, ProviderError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::knowledge::LowConfidencePolicy;
use parley_core::message::History;
use parley_core::persona::Persona;
use parley_core::provider::{GenerationRequest, Provider, SamplingParams};
use parley_knowledge::{RetrievalPolicy, Retriever, VectorIndex};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::{PromptError, PromptSynthesizer};
use crate::normalizer::ResponseNormalizer;

/// `source_id` of an answer that found no relevant knowledge.
pub const NO_MATCH: &str = "no_match";

/// `source_id` of an answer that failed.
pub const ERROR_SOURCE: &str = "error";

/// Session id used on events raised by one-shot answers.
pub const ONE_SHOT_SESSION: &str = "one-shot";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] KnowledgeError),

    #[error("Prompt synthesis failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("Generation failed: {0}")]
    Generation(#[from] ProviderError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generated reply was empty after normalization")]
    EmptyResponse,
}

/// How a reply was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOrigin {
    /// Generated from retrieved context.
    Grounded,
    /// Generated with no context (ungrounded low-confidence policy).
    Ungrounded,
    /// Persona line returned without calling the backend.
    Canned,
}

/// A successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub text: String,
    /// Source of the best-ranked chunk, if any knowledge was used.
    pub source_id: Option<String>,
    pub confidence: u8,
    pub origin: ReplyOrigin,
}

/// Result of a one-shot query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub source_id: String,
    pub confidence: u8,
}

pub struct TurnEngine {
    retriever: Retriever,
    generator: Arc<dyn Provider>,
    persona: Persona,
    synthesizer: PromptSynthesizer,
    normalizer: ResponseNormalizer,
    sampling: SamplingParams,
    timeout: Duration,
    low_confidence: LowConfidencePolicy,
    events: Option<Arc<EventBus>>,
}

impl TurnEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn Provider>, persona: Persona) -> Self {
        Self {
            retriever,
            generator,
            persona,
            synthesizer: PromptSynthesizer::default(),
            normalizer: ResponseNormalizer::default(),
            sampling: SamplingParams::default(),
            timeout: DEFAULT_TIMEOUT,
            low_confidence: LowConfidencePolicy::default(),
            events: None,
        }
    }

    /// Wire an engine from the application config.
    pub fn from_config(
        config: &AppConfig,
        index: Arc<VectorIndex>,
        generator: Arc<dyn Provider>,
    ) -> Self {
        let policy = RetrievalPolicy {
            top_k: config.knowledge.top_k,
            min_relevance: config.knowledge.min_relevance,
            unscored_confidence: config.knowledge.unscored_confidence,
            follow_up_turns: config.knowledge.follow_up_turns,
        };
        Self::new(
            Retriever::new(index, policy),
            generator,
            config.persona.clone(),
        )
        .with_synthesizer(PromptSynthesizer::new(config.session.context_budget_tokens))
        .with_normalizer(ResponseNormalizer::from_config(&config.response))
        .with_sampling(config.generation.sampling())
        .with_timeout(config.generation.timeout())
        .with_low_confidence(config.knowledge.low_confidence)
    }

    pub fn with_synthesizer(mut self, synthesizer: PromptSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    /// Ceiling on a single generation call, fallback chain included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_low_confidence(mut self, policy: LowConfidencePolicy) -> Self {
        self.low_confidence = policy;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Produce the assistant's reply to `message` given the prior `history`.
    pub async fn respond(&self, message: &str, history: &History) -> Result<TurnReply, TurnError> {
        if !message.chars().any(char::is_alphanumeric) {
            debug!("Input has no words, asking for clarification");
            return Ok(self.canned(&self.persona.clarification));
        }

        let retrieval = self.retriever.retrieve(message, history).await?;

        let origin = if retrieval.is_empty() {
            match self.low_confidence {
                LowConfidencePolicy::Escalate => {
                    info!("No relevant knowledge, escalating");
                    return Ok(self.canned(&self.persona.low_confidence_reply));
                }
                LowConfidencePolicy::Ungrounded => ReplyOrigin::Ungrounded,
            }
        } else {
            ReplyOrigin::Grounded
        };

        let prompt = self.synthesizer.synthesize(
            &self.persona,
            &retrieval.fragments,
            history.turns(),
            message,
        )?;

        debug!(
            provider = self.generator.name(),
            prompt_tokens = prompt.estimated_tokens,
            history_turns = prompt.history_turns,
            dropped_turns = prompt.dropped_turns,
            "Generating reply"
        );

        let request = GenerationRequest::new(prompt.text, self.sampling.clone());
        let response = tokio::time::timeout(self.timeout, self.generator.generate(request))
            .await
            .map_err(|_| TurnError::Timeout(self.timeout))??;

        let text = self.normalizer.normalize(&response.text);
        if text.is_empty() {
            return Err(TurnError::EmptyResponse);
        }

        Ok(TurnReply {
            text,
            source_id: retrieval.top_source().map(str::to_string),
            confidence: retrieval.confidence,
            origin,
        })
    }

    /// One-shot query with no history. Failures become the persona's error
    /// reply with `source_id = "error"`.
    pub async fn answer(&self, question: &str) -> Answer {
        let answer = match self.respond(question, &History::new()).await {
            Ok(reply) => Answer {
                text: reply.text,
                source_id: reply.source_id.unwrap_or_else(|| NO_MATCH.to_string()),
                confidence: reply.confidence,
            },
            Err(e) => {
                warn!(error = %e, "One-shot answer failed");
                self.publish(DomainEvent::GenerationFailed {
                    session_id: ONE_SHOT_SESSION.into(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Answer {
                    text: self.persona.error_reply.clone(),
                    source_id: ERROR_SOURCE.to_string(),
                    confidence: 0,
                }
            }
        };

        info!(
            source = %answer.source_id,
            confidence = answer.confidence,
            "Answer served"
        );
        self.publish(DomainEvent::AnswerServed {
            source_id: answer.source_id.clone(),
            confidence: answer.confidence,
            timestamp: chrono::Utc::now(),
        });
        answer
    }

    fn canned(&self, text: &str) -> TurnReply {
        TurnReply {
            text: text.to_string(),
            source_id: None,
            confidence: 0,
            origin: ReplyOrigin::Canned,
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl std::fmt::Debug for TurnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnEngine")
            .field("generator", &self.generator.name())
            .field("persona", &self.persona.name)
            .field("chunks", &self.retriever.index().len())
            .field("timeout", &self.timeout)
            .field("low_confidence", &self.low_confidence)
            .finish()
    }
}
