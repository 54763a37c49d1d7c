//! Build-time pipeline: load → chunk → embed → index.

use parley_core::error::{IngestionError, KnowledgeError};
use parley_core::event::{DomainEvent, EventBus};
use parley_core::provider::Embedder;
use std::sync::Arc;

use crate::chunker::Chunker;
use crate::index::VectorIndex;
use crate::loader::{CorpusLoader, Source};

/// An indexed corpus plus what was rejected on the way in.
#[derive(Debug)]
pub struct IndexedCorpus {
    pub index: Arc<VectorIndex>,
    pub fragments: usize,
    pub errors: Vec<IngestionError>,
}

/// Load every source, chunk the fragments and build a fresh index.
///
/// Rejected sources are collected in `errors`; only embedding failures
/// abort the build.
pub async fn build_corpus(
    sources: Vec<Source>,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    events: Option<&EventBus>,
) -> Result<IndexedCorpus, KnowledgeError> {
    let report = CorpusLoader::new().load(sources);
    let chunks = chunker.chunk_all(&report.fragments);
    let index = VectorIndex::build(chunks, embedder).await?;

    if let Some(bus) = events {
        bus.publish(DomainEvent::KnowledgeIndexed {
            fragments: report.fragments.len(),
            chunks: index.len(),
            rejected_sources: report.errors.len(),
            timestamp: chrono::Utc::now(),
        });
    }

    Ok(IndexedCorpus {
        index: Arc::new(index),
        fragments: report.fragments.len(),
        errors: report.errors,
    })
}
