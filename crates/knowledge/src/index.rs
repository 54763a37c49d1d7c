//! In-memory vector index over chunks.
//!
//! Built once per ingestion batch and read-only afterwards, so it can be
//! shared behind an `Arc` and queried concurrently without locking. A
//! rebuild produces a new index; entries are never patched in place.

use parley_core::error::KnowledgeError;
use parley_core::knowledge::{Chunk, RetrievalResult};
use parley_core::provider::{Embedder, EmbeddingRequest};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::vector::relevance;

/// Texts sent to the embedder per request during `build`.
const EMBED_BATCH: usize = 32;

/// One indexed chunk and its embedding. The position in the index is the
/// entry's ordinal and the tie-break for equal scores.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: Option<usize>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// An unbuilt index. Every query returns no results.
    pub fn empty(embedder: Arc<dyn Embedder>) -> Self {
        Self { entries: Vec::new(), dimension: None, embedder }
    }

    /// Embed every chunk and store it.
    ///
    /// All embeddings must share one dimension.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, KnowledgeError> {
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dimension: Option<usize> = None;
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(EMBED_BATCH).collect();
            let inputs = batch.iter().map(|c| c.text.clone()).collect();
            let response = embedder.embed(EmbeddingRequest { inputs }).await?;

            if response.embeddings.len() != batch.len() {
                return Err(KnowledgeError::CountMismatch {
                    expected: batch.len(),
                    actual: response.embeddings.len(),
                });
            }

            for (chunk, embedding) in batch.into_iter().zip(response.embeddings) {
                let expected = *dimension.get_or_insert(embedding.len());
                if embedding.len() != expected {
                    return Err(KnowledgeError::DimensionMismatch {
                        expected,
                        actual: embedding.len(),
                    });
                }
                entries.push(IndexEntry { chunk, embedding });
            }
        }

        info!(
            chunks = entries.len(),
            dimension = dimension.unwrap_or(0),
            embedder = embedder.name(),
            "vector index built"
        );
        Ok(Self { entries, dimension, embedder })
    }

    /// Top-`k` chunks by descending relevance to `text`.
    ///
    /// An empty or unbuilt index returns an empty list without consulting
    /// the embedder.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalResult>, KnowledgeError> {
        if self.entries.is_empty() || k == 0 {
            debug!("query against empty index");
            return Ok(Vec::new());
        }

        let query = self.embedder.embed_one(text).await?;
        if let Some(expected) = self.dimension
            && query.len() != expected
        {
            return Err(KnowledgeError::DimensionMismatch {
                expected,
                actual: query.len(),
            });
        }
        Ok(self.rank(&query, k))
    }

    /// Rank all entries against a query embedding.
    ///
    /// Scored entries come first by descending score; entries whose score is
    /// undefined follow. Equal scores keep index order.
    pub fn rank(&self, query: &[f32], k: usize) -> Vec<RetrievalResult> {
        let mut scored: Vec<(Option<f32>, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (relevance(&entry.embedding, query), entry))
            .collect();

        // `sort_by` is stable, so ties fall back to insertion order.
        scored.sort_by(|a, b| match (a.0, b.0) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, entry)| RetrievalResult {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("embedder", &self.embedder.name())
            .finish()
    }
}
