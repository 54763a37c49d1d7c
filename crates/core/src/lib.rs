//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! engine. This crate performs no I/O; it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability (generation, embedding, input, output) is a
//! trait here. Implementations live in their respective crates, so backends
//! can be swapped via configuration and replaced with mocks in tests.

pub mod error;
pub mod message;
pub mod provider;
pub mod channel;
pub mod knowledge;
pub mod persona;
pub mod session;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ConversationTurn, History, HistoryError, Role, SessionId};
pub use provider::{Embedder, GenerationRequest, GenerationResponse, Provider, SamplingParams};
pub use channel::{InputChannel, InputOrigin, OutputChannel, UserInput};
pub use knowledge::{Chunk, Fragment, LowConfidencePolicy, Provenance, RetrievalResult, SourceType};
pub use persona::Persona;
pub use session::{ActivePhase, InterruptPolicy, QueueOrdering, SessionMode, SessionState};
pub use event::{DomainEvent, EventBus, UtteranceKind};
