//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::persona::Persona;
use parley_core::provider::SamplingParams;
use parley_core::{InterruptPolicy, LowConfidencePolicy, QueueOrdering};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Generative backends the router knows how to build.
pub const GENERATION_PROVIDERS: &[&str] = &["ollama", "openai_compat", "mock"];

/// Embedding backends the router knows how to build.
pub const EMBEDDING_PROVIDERS: &[&str] = &["hashing", "ollama", "openai_compat"];

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative backend and sampling parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding backend for the vector index
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Corpus, chunking and retrieval settings
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Assistant identity and prompt template
    #[serde(default)]
    pub persona: Persona,

    /// Turn-taking policy for live sessions
    #[serde(default)]
    pub session: SessionConfig,

    /// Post-processing of generated text
    #[serde(default)]
    pub response: ResponseConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Simulated speech playback for console voice mode
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

fn default_true() -> bool {
    true
}

// ── Generation ──────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "parley_core::provider::default_stop")]
    pub stop: Vec<String>,

    /// Ceiling for one generation call; exceeding it is a failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Models tried in order on the same backend when the primary fails.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_models: Vec<String>,
}

fn default_generation_provider() -> String {
    "ollama".into()
}
fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "tinyllama".into()
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
fn default_timeout_secs() -> u64 {
    30
}

impl GenerationConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop: self.stop.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            stop: parley_core::provider::default_stop(),
            timeout_secs: default_timeout_secs(),
            fallback_models: vec![],
        }
    }
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("stop", &self.stop)
            .field("timeout_secs", &self.timeout_secs)
            .field("fallback_models", &self.fallback_models)
            .finish()
    }
}

// ── Embedding ───────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Vector width for the offline hashing embedder.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "hashing".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_dimensions() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_base_url(),
            model: default_embedding_model(),
            api_key: None,
            dimensions: default_dimensions(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

// ── Knowledge ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive windows
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits scoring below this are discarded before confidence is derived.
    #[serde(default)]
    pub min_relevance: f32,

    /// Confidence reported when the top hit carries no similarity score.
    #[serde(default = "default_unscored_confidence")]
    pub unscored_confidence: u8,

    #[serde(default)]
    pub low_confidence: LowConfidencePolicy,

    /// Earlier user turns folded into the retrieval query, so a follow-up
    /// such as "who owns that?" still finds the case it refers to.
    #[serde(default)]
    pub follow_up_turns: usize,

    /// Plain-text or markdown files (or directories of them) to ingest.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<PathBuf>,

    /// Load the curated facts and client cases shipped with the binary.
    #[serde(default = "default_true")]
    pub include_builtin: bool,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    3
}
fn default_unscored_confidence() -> u8 {
    50
}

/// Longest history slice folded into a retrieval query.
pub const MAX_FOLLOW_UP_TURNS: usize = 4;

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            top_k: default_top_k(),
            min_relevance: 0.0,
            unscored_confidence: default_unscored_confidence(),
            low_confidence: LowConfidencePolicy::default(),
            follow_up_turns: 0,
            documents: vec![],
            include_builtin: true,
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub interrupt_policy: InterruptPolicy,

    #[serde(default)]
    pub ordering: QueueOrdering,

    /// Upper bound on queued inputs under FIFO ordering.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Speak the persona greeting when a voice session becomes active.
    #[serde(default = "default_true")]
    pub greet_on_voice: bool,

    /// Token budget for the synthesized prompt.
    #[serde(default = "default_context_budget")]
    pub context_budget_tokens: usize,
}

fn default_max_pending() -> usize {
    8
}
fn default_context_budget() -> usize {
    2048
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interrupt_policy: InterruptPolicy::default(),
            ordering: QueueOrdering::default(),
            max_pending: default_max_pending(),
            greet_on_voice: true,
            context_budget_tokens: default_context_budget(),
        }
    }
}

// ── Response ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Maximum characters in a normalized reply.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_stop_markers")]
    pub stop_markers: Vec<String>,
}

fn default_max_length() -> usize {
    80
}

pub fn default_stop_markers() -> Vec<String> {
    ["\n\n", "User:", "Assistant:", "Human:", "AI:", "\nUser", "\nAssistant"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            stop_markers: default_stop_markers(),
        }
    }
}

// ── Gateway ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

// ── Playback ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Hold each utterance for an estimated speaking duration.
    #[serde(default)]
    pub simulate: bool,

    #[serde(default = "default_min_ms")]
    pub min_ms: u64,

    #[serde(default = "default_per_char_ms")]
    pub per_char_ms: u64,
}

fn default_min_ms() -> u64 {
    2000
}
fn default_per_char_ms() -> u64 {
    100
}

impl PlaybackConfig {
    /// Estimated time to speak `text` aloud.
    pub fn duration_for(&self, text: &str) -> Duration {
        let per_char = self.per_char_ms.saturating_mul(text.chars().count() as u64);
        Duration::from_millis(per_char.max(self.min_ms))
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            simulate: false,
            min_ms: default_min_ms(),
            per_char_ms: default_per_char_ms(),
        }
    }
}

// ── Loading ─────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path, then apply environment overrides.
    ///
    /// `PARLEY_CONFIG` points at an alternative file.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("PARLEY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay `PARLEY_*` variables onto the generation section.
    ///
    /// `lookup` abstracts the environment so tests need not mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let generation = &mut self.generation;

        if let Some(url) = lookup("PARLEY_BASE_URL") {
            generation.base_url = url;
        }
        if let Some(model) = lookup("PARLEY_MODEL") {
            generation.model = model;
        }
        if let Some(key) = lookup("PARLEY_API_KEY") {
            generation.api_key = Some(key);
        }
        if let Some(raw) = lookup("PARLEY_TEMPERATURE") {
            generation.temperature = parse_env("PARLEY_TEMPERATURE", &raw)?;
        }
        if let Some(raw) = lookup("PARLEY_TOP_P") {
            generation.top_p = parse_env("PARLEY_TOP_P", &raw)?;
        }
        if let Some(raw) = lookup("PARLEY_MAX_TOKENS") {
            generation.max_tokens = parse_env("PARLEY_MAX_TOKENS", &raw)?;
        }
        if let Some(raw) = lookup("PARLEY_STOP_SEQUENCES") {
            generation.stop = raw
                .split(',')
                .map(|s| s.replace("\\n", "\n"))
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if !GENERATION_PROVIDERS.contains(&g.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown generation provider '{}' (expected one of {})",
                g.provider,
                GENERATION_PROVIDERS.join(", ")
            )));
        }
        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown embedding provider '{}' (expected one of {})",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            )));
        }
        if !(0.0..=2.0).contains(&g.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if g.top_p <= 0.0 || g.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }
        if g.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation.timeout_secs must be > 0".into(),
            ));
        }

        let k = &self.knowledge;
        if k.chunk_size <= k.overlap {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.chunk_size ({}) must exceed knowledge.overlap ({})",
                k.chunk_size, k.overlap
            )));
        }
        if k.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.top_k must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&k.min_relevance) {
            return Err(ConfigError::ValidationError(
                "knowledge.min_relevance must be between 0.0 and 1.0".into(),
            ));
        }
        if k.unscored_confidence > 100 {
            return Err(ConfigError::ValidationError(
                "knowledge.unscored_confidence must be <= 100".into(),
            ));
        }
        if k.follow_up_turns > MAX_FOLLOW_UP_TURNS {
            return Err(ConfigError::ValidationError(format!(
                "knowledge.follow_up_turns must be <= {MAX_FOLLOW_UP_TURNS}"
            )));
        }
        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be > 0".into(),
            ));
        }
        if self.response.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "response.max_length must be > 0".into(),
            ));
        }
        if self.session.max_pending == 0 {
            return Err(ConfigError::ValidationError(
                "session.max_pending must be > 0".into(),
            ));
        }
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.port must be > 0".into(),
            ));
        }

        let unknown = self.persona.unknown_placeholders();
        if !unknown.is_empty() {
            tracing::warn!(
                placeholders = ?unknown,
                "persona template references unknown fields; they will be left verbatim"
            );
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `config --init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::EnvError {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: '{value}'")]
    EnvError { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
