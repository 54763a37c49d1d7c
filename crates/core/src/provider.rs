//! Provider traits: the abstraction over generative and embedding backends.
//!
//! A [`Provider`] turns a finished prompt into text. An [`Embedder`] turns
//! text into vectors. Both are black boxes reached through a stable call
//! contract; the rest of the system never knows which backend answered.
//!
//! Implementations: Ollama, OpenAI-compatible endpoints, offline hashing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;

/// Sampling parameters passed through to the generative backend untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus-sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Stop sequences
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.2
}

fn default_top_p() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    50
}

/// Role-switch markers a small chat model tends to emit when it starts
/// writing the next turn itself.
pub fn default_stop() -> Vec<String> {
    ["\n\n", "User:", "Assistant:", "Human:", "AI:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            stop: default_stop(),
        }
    }
}

/// A single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model override; `None` uses the provider's configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The fully synthesized prompt
    pub prompt: String,

    #[serde(default)]
    pub sampling: SamplingParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, sampling: SamplingParams) -> Self {
        Self { model: None, prompt: prompt.into(), sampling }
    }
}

/// The raw text a backend produced, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,

    /// Which model actually responded
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An embedding request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// The texts to embed.
    pub inputs: Vec<String>,
}

/// An embedding response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The embedding vectors, one per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,

    /// Which model was used.
    pub model: String,
}

/// The generative backend.
///
/// The engine calls `generate()` with a finished prompt and never inspects
/// which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Generate a completion for the prompt.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

/// The embedding capability consumed by the vector index.
///
/// Must be deterministic for identical text within a process lifetime.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError>;

    /// Convenience wrapper for a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let response = self
            .embed(EmbeddingRequest { inputs: vec![text.to_string()] })
            .await?;
        response.embeddings.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse(format!("{} returned no embedding", self.name()))
        })
    }
}
