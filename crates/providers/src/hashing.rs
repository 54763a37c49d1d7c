//! Offline embedder: feature-hashed bag of words.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of
//! `dimensions` buckets, counts are accumulated, and the vector is
//! L2-normalized. Text with no tokens embeds to the zero vector.
//!
//! It captures lexical overlap only, which is enough for a small curated
//! corpus and makes tests and offline demos fully deterministic.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::{Embedder, EmbeddingRequest, EmbeddingResponse};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(
        &self,
        request: EmbeddingRequest,
    ) -> std::result::Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| self.embed_text(t)).collect(),
            model: format!("hashing-{}", self.dimensions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn identical_text_embeds_identically() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.embed_text("Wire transfer received"), e.embed_text("wire TRANSFER, received!"));
    }

    #[test]
    fn vectors_are_unit_length() {
        let v = HashingEmbedder::new(64).embed_text("passport uploaded needs attestation");
        assert!((dot(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn punctuation_only_embeds_to_zero() {
        let v = HashingEmbedder::new(16).embed_text("?! ...");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn overlap_scores_higher_than_disjoint() {
        let e = HashingEmbedder::new(256);
        let q = e.embed_text("treasury posting delay");
        let near = e.embed_text("funding pending treasury posting");
        let far = e.embed_text("quarterly tax residency review");
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[tokio::test]
    async fn embed_preserves_input_order() {
        let e = HashingEmbedder::new(32);
        let response = e
            .embed(EmbeddingRequest { inputs: vec!["alpha".into(), "beta".into()] })
            .await
            .unwrap();
        assert_eq!(response.embeddings[0], e.embed_text("alpha"));
        assert_eq!(response.embeddings[1], e.embed_text("beta"));
    }
}
