//! Retriever: ranks knowledge for a question and derives a confidence.

use parley_core::error::KnowledgeError;
use parley_core::knowledge::RetrievalResult;
use parley_core::message::{History, Role};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::index::VectorIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPolicy {
    /// Number of hits requested from the index.
    pub top_k: usize,

    /// Scored hits below this relevance are dropped.
    pub min_relevance: f32,

    /// Confidence reported when the top hit has no similarity score.
    pub unscored_confidence: u8,

    /// Prior user turns appended to the query text so follow-ups like
    /// "and who owns that?" still match. Zero uses the question alone.
    pub follow_up_turns: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_relevance: 0.0,
            unscored_confidence: 50,
            follow_up_turns: 0,
        }
    }
}

/// Ranked knowledge for one question.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Retrieval {
    /// Most relevant first.
    pub fragments: Vec<RetrievalResult>,

    /// 0–100. Zero exactly when `fragments` is empty.
    pub confidence: u8,
}

impl Retrieval {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Source of the best hit.
    pub fn top_source(&self) -> Option<&str> {
        self.fragments.first().map(|r| r.source_id())
    }
}

#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    policy: RetrievalPolicy,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, policy: RetrievalPolicy) -> Self {
        Self { index, policy }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    /// Query the index and derive a confidence from the best hit.
    ///
    /// An empty result (no index, nothing relevant) is not an error: it
    /// yields confidence 0 and the caller falls back to an ungrounded reply.
    pub async fn retrieve(
        &self,
        question: &str,
        history: &History,
    ) -> Result<Retrieval, KnowledgeError> {
        let query = self.query_text(question, history);
        let mut fragments = self.index.query(&query, self.policy.top_k).await?;
        fragments.retain(|r| r.score.is_none_or(|s| s >= self.policy.min_relevance));

        let confidence = match fragments.first() {
            None => 0,
            Some(top) => match top.score {
                Some(score) => to_percent(score),
                None => {
                    warn!(
                        source = top.source_id(),
                        confidence = self.policy.unscored_confidence,
                        "top hit has no similarity score; using configured confidence"
                    );
                    self.policy.unscored_confidence
                }
            },
        };

        debug!(
            hits = fragments.len(),
            top_score = ?fragments.first().and_then(|r| r.score),
            confidence,
            "retrieval complete"
        );
        Ok(Retrieval { fragments, confidence })
    }

    fn query_text(&self, question: &str, history: &History) -> String {
        if self.policy.follow_up_turns == 0 {
            return question.to_string();
        }
        let mut prior: Vec<&str> = history
            .turns()
            .iter()
            .rev()
            .filter(|t| t.role == Role::User)
            .take(self.policy.follow_up_turns)
            .map(|t| t.content.as_str())
            .collect();
        prior.reverse();
        prior.push(question);
        prior.join(" ")
    }
}

/// Similarity in [0, 1] → rounded percentage.
fn to_percent(score: f32) -> u8 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}
