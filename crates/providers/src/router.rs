//! Backend router: builds the generator and embedder named in config.

use std::sync::Arc;

use parley_config::{AppConfig, EmbeddingConfig, GenerationConfig};
use parley_core::error::ProviderError;
use parley_core::provider::{Embedder, Provider};
use tracing::info;

use crate::fallback::FallbackProvider;
use crate::hashing::HashingEmbedder;
use crate::mock::MockProvider;
use crate::ollama::{OllamaEmbedder, OllamaProvider};
use crate::openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};

/// The pair of backends a running assistant needs.
#[derive(Clone)]
pub struct Backends {
    pub generator: Arc<dyn Provider>,
    pub embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("generator", &self.generator.name())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

/// Build both backends from configuration.
pub fn build_from_config(config: &AppConfig) -> Result<Backends, ProviderError> {
    Ok(Backends {
        generator: build_generator(&config.generation)?,
        embedder: build_embedder(&config.embedding)?,
    })
}

/// Build the generative backend.
///
/// With `fallback_models` set, the primary model is wrapped in a
/// [`FallbackProvider`] that retries the same backend with each listed
/// model in turn. The chain shares `generation.timeout_secs`, the same
/// ceiling the turn engine puts around a generation call.
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let primary = single_generator(config, &config.model)?;
    if config.fallback_models.is_empty() {
        info!(provider = %config.provider, model = %config.model, "Generator ready");
        return Ok(primary);
    }

    let mut chain = FallbackProvider::new(config.provider.clone(), config.timeout()).then(primary);
    for model in &config.fallback_models {
        chain = chain.then_model(single_generator(config, model)?, model.clone());
    }
    info!(
        provider = %config.provider,
        model = %config.model,
        fallbacks = config.fallback_models.len(),
        "Generator ready with fallback chain"
    );
    Ok(Arc::new(chain))
}

fn single_generator(
    config: &GenerationConfig,
    model: &str,
) -> Result<Arc<dyn Provider>, ProviderError> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(&config.base_url, model))),
        "openai_compat" => Ok(Arc::new(OpenAiCompatProvider::new(
            "openai_compat",
            &config.base_url,
            config.api_key.clone().unwrap_or_default(),
            model,
        ))),
        "mock" => Ok(Arc::new(MockProvider::default())),
        other => Err(ProviderError::NotConfigured(format!(
            "unknown generation provider '{other}'"
        ))),
    }
}

/// Build the embedding backend used by the vector index.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ProviderError> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "hashing" => Arc::new(HashingEmbedder::new(config.dimensions)),
        "ollama" => Arc::new(OllamaEmbedder::new(&config.base_url, &config.model)),
        "openai_compat" => Arc::new(OpenAiCompatEmbedder::new(
            &config.base_url,
            config.api_key.clone().unwrap_or_default(),
            &config.model,
        )),
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown embedding provider '{other}'"
            )));
        }
    };
    info!(provider = %config.provider, "Embedder ready");
    Ok(embedder)
}
