//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Knowledge errors ---
    #[error("Knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("History error: {0}")]
    History(#[from] crate::message::HistoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Output failed on {channel}: {reason}")]
    OutputFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),
}

/// Failures turning a raw source into fragments. Reported per source; a
/// failing source never aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    #[error("Unsupported format for {source_id}: {media_type}")]
    UnsupportedFormat { source_id: String, media_type: String },

    #[error("Source {0} is not valid UTF-8")]
    InvalidEncoding(String),

    #[error("Source {0} contains no text")]
    Empty(String),

    #[error("Failed to read {source_id}: {reason}")]
    Unreadable { source_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error("Invalid chunk policy: chunk_size {chunk_size} must exceed overlap {overlap}")]
    InvalidChunkPolicy { chunk_size: usize, overlap: usize },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedder returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session has ended")]
    Ended,

    #[error("Invalid transition: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Input rejected: {0}")]
    InputRejected(String),
}
