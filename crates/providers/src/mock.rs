//! Scripted generative backend for offline demos (`provider = "mock"`).

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::provider::{GenerationRequest, GenerationResponse, Provider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Cycles through a fixed list of replies, optionally after a delay.
pub struct MockProvider {
    replies: Vec<String>,
    next: AtomicUsize,
    delay: Duration,
}

impl MockProvider {
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(vec![
            "Let me check the onboarding queue for you. I'll share the pending steps next.".into(),
            "Three cases are past SLA. Want me to start with the oldest one?".into(),
        ])
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        _request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.replies.is_empty() {
            return Err(ProviderError::NotConfigured("mock provider has no replies".into()));
        }
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        Ok(GenerationResponse {
            text: self.replies[i % self.replies.len()].clone(),
            model: "mock".into(),
            usage: None,
        })
    }
}
