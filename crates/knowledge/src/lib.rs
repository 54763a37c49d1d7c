//! Knowledge for Parley: turning documents and case data into a ranked,
//! queryable index.
//!
//! Build time: [`loader`] → [`chunker`] → [`index`].
//! Query time: [`retriever`] asks the index and derives a confidence.

pub mod loader;
pub mod chunker;
pub mod vector;
pub mod index;
pub mod retriever;
pub mod cases;
pub mod builtin;
pub mod pipeline;

pub use loader::{CorpusLoader, LoadReport, Source};
pub use chunker::{ChunkPolicy, Chunker, split};
pub use vector::cosine_similarity;
pub use index::{IndexEntry, VectorIndex};
pub use retriever::{Retrieval, RetrievalPolicy, Retriever};
pub use cases::{CaseBook, CaseRecord};
pub use pipeline::{IndexedCorpus, build_corpus};
