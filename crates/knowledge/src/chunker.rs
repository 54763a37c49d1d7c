//! Fixed-window chunking with exact overlap.
//!
//! Windows are measured in characters. Consecutive chunks of one fragment
//! share exactly `overlap` characters; only the final chunk may be shorter
//! than `chunk_size`.

use parley_core::error::KnowledgeError;
use parley_core::knowledge::{Chunk, Fragment, Provenance};

/// A validated `(chunk_size, overlap)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkPolicy {
    /// Requires `chunk_size > overlap`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, KnowledgeError> {
        if chunk_size <= overlap {
            return Err(KnowledgeError::InvalidChunkPolicy { chunk_size, overlap });
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200 }
    }
}

/// Split one fragment. Pure: the same input always yields the same chunks.
pub fn split(
    fragment: &Fragment,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, KnowledgeError> {
    let policy = ChunkPolicy::new(chunk_size, overlap)?;
    Ok(split_with(fragment, policy))
}

/// Split one fragment under an already-validated policy.
pub fn split_with(fragment: &Fragment, policy: ChunkPolicy) -> Vec<Chunk> {
    let text = fragment.text.as_str();
    // Byte offset of every char boundary, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let provenance = Provenance {
        source_id: fragment.source_id.clone(),
        source_type: fragment.source_type,
    };
    let make = |start: usize, end: usize| Chunk {
        fragment_id: fragment.id.clone(),
        offset: start,
        length: end - start,
        text: text[bounds[start]..bounds[end]].to_string(),
        provenance: provenance.clone(),
    };

    if total <= policy.chunk_size {
        return vec![make(0, total)];
    }

    let mut chunks = Vec::with_capacity(total / policy.step() + 1);
    let mut start = 0;
    loop {
        let end = (start + policy.chunk_size).min(total);
        chunks.push(make(start, end));
        if end == total {
            break;
        }
        start += policy.step();
    }
    chunks
}

/// Applies one policy across a batch of fragments, preserving fragment order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    policy: ChunkPolicy,
}

impl Chunker {
    pub fn new(policy: ChunkPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ChunkPolicy {
        self.policy
    }

    pub fn chunk_all(&self, fragments: &[Fragment]) -> Vec<Chunk> {
        fragments
            .iter()
            .flat_map(|f| split_with(f, self.policy))
            .collect()
    }
}
