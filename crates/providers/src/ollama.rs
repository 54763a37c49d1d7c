//! Ollama backend: raw completions via `/api/generate`, embeddings via
//! `/api/embed`.
//!
//! Sampling parameters travel in the `options` object; `max_tokens` maps to
//! Ollama's `num_predict`.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: http::client(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_body<'a>(&'a self, request: &'a GenerationRequest) -> GenerateBody<'a> {
        let sampling = &request.sampling;
        GenerateBody {
            model: request.model.as_deref().unwrap_or(&self.model),
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: sampling.temperature,
                top_p: sampling.top_p,
                num_predict: sampling.max_tokens,
                stop: &sampling.stop,
            },
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = self.generate_body(&request);
        debug!(model = %body.model, prompt_chars = request.prompt.len(), "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::ensure_success("ollama", body.model, response).await?;

        let api: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let usage = match (api.prompt_eval_count, api.eval_count) {
            (Some(p), Some(c)) => Some(Usage {
                prompt_tokens: p,
                completion_tokens: c,
                total_tokens: p + c,
            }),
            _ => None,
        };

        Ok(GenerationResponse {
            text: api.response,
            model: api.model,
            usage,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(http::network_error)?;
        Ok(response.status().is_success())
    }
}

/// Ollama's embedding endpoint, usable as the index's [`Embedder`].
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: http::client(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": request.inputs,
        });
        debug!(model = %self.model, count = request.inputs.len(), "Sending embedding request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(http::network_error)?;
        let response = http::ensure_success("ollama", &self.model, response).await?;

        let api: EmbedResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(EmbeddingResponse {
            embeddings: api.embeddings,
            model: api.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

// --- Ollama API types ---

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    model: Option<String>,
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_trimmed() {
        let provider = OllamaProvider::new("http://localhost:11434/", "tinyllama");
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn generate_body_maps_sampling_to_options() {
        let provider = OllamaProvider::new(DEFAULT_BASE_URL, "tinyllama");
        let request = GenerationRequest::new("User: hi. Assistant:", SamplingParams::default());
        let json = serde_json::to_value(provider.generate_body(&request)).unwrap();

        assert_eq!(json["model"], "tinyllama");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 50);
        assert_eq!(json["options"]["stop"][1], "User:");
        assert!((json["options"]["top_p"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn request_model_overrides_default() {
        let provider = OllamaProvider::new(DEFAULT_BASE_URL, "tinyllama");
        let mut request = GenerationRequest::new("p", SamplingParams::default());
        request.model = Some("phi3".into());
        assert_eq!(provider.generate_body(&request).model, "phi3");
    }

    #[test]
    fn parse_generate_response() {
        let data = r#"{"model":"tinyllama","response":"John Kim needs attestation.","done":true,"prompt_eval_count":120,"eval_count":9}"#;
        let parsed: GenerateResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.response, "John Kim needs attestation.");
        assert_eq!(parsed.eval_count, Some(9));
    }

    #[test]
    fn parse_embed_response() {
        let data = r#"{"model":"nomic-embed-text","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let parsed: EmbedResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.embeddings.len(), 2);
    }
}
