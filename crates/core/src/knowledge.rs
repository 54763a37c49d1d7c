//! Knowledge domain types shared by the loader, index, retriever and engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of source a fragment was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    CuratedFact,
    StructuredRecord,
    UploadedDocument,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SourceType::CuratedFact => "curated-fact",
            SourceType::StructuredRecord => "structured-record",
            SourceType::UploadedDocument => "uploaded-document",
        };
        f.write_str(label)
    }
}

/// An immutable unit of knowledge text with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Content-derived identifier; identical source + text yields the same id.
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
}

/// Where a chunk's text originally came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: String,
    pub source_type: SourceType,
}

/// A bounded slice of a fragment's text.
///
/// `offset` and `length` are measured in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub fragment_id: String,
    pub offset: usize,
    pub length: usize,
    pub text: String,
    pub provenance: Provenance,
}

/// A ranked hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,

    /// Normalized similarity in [0, 1]. `None` when the metric could not be
    /// computed for this entry (e.g. a zero-length embedding).
    pub score: Option<f32>,
}

impl RetrievalResult {
    pub fn source_id(&self) -> &str {
        &self.chunk.provenance.source_id
    }
}

/// What a one-shot answer does when retrieval finds nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowConfidencePolicy {
    /// Reply with the persona's hand-off line without calling the backend.
    #[default]
    Escalate,
    /// Generate anyway, with an empty context block.
    Ungrounded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_display_matches_serde() {
        let json = serde_json::to_string(&SourceType::StructuredRecord).unwrap();
        assert_eq!(json, format!("\"{}\"", SourceType::StructuredRecord));
    }
}
