//! Generation and embedding backends for Parley.
//!
//! Generators implement `parley_core::Provider`, embedders implement
//! `parley_core::Embedder`. The router builds both from configuration.

pub mod fallback;
pub mod hashing;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai_compat;
pub mod router;

pub use fallback::FallbackProvider;
pub use hashing::HashingEmbedder;
pub use mock::MockProvider;
pub use ollama::{OllamaEmbedder, OllamaProvider};
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatProvider};
pub use router::{Backends, build_embedder, build_from_config, build_generator};
