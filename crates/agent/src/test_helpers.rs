//! Shared test helpers for engine and session tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::channel::OutputChannel;
use parley_core::error::{ChannelError, ProviderError};
use parley_core::provider::{GenerationRequest, GenerationResponse, Provider};
use parley_knowledge::{Chunker, Source, VectorIndex, build_corpus};
use parley_providers::HashingEmbedder;

/// Index `sources` with the offline embedder and default chunking.
pub async fn indexed(sources: Vec<Source>) -> Arc<VectorIndex> {
    build_corpus(
        sources,
        Chunker::default(),
        Arc::new(HashingEmbedder::new(256)),
        None,
    )
    .await
    .unwrap()
    .index
}

/// A provider that cycles through scripted replies (or always fails),
/// optionally after a delay, and records every prompt it receives.
///
/// Tracks how many `generate` calls overlap so tests can assert
/// single-flight.
pub struct ScriptedProvider {
    replies: Vec<String>,
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying(&[])
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

/// Decrements the in-flight gauge even when the call is dropped mid-way.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);
        self.prompts.lock().unwrap().push(request.prompt);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail || self.replies.is_empty() {
            return Err(ProviderError::Network("connection refused".into()));
        }
        Ok(GenerationResponse {
            text: self.replies[n % self.replies.len()].clone(),
            model: "scripted".into(),
            usage: None,
        })
    }
}

/// An output channel that records what it was asked to say.
pub struct RecordingOutput {
    spoken: Mutex<Vec<String>>,
    playback: Duration,
    fail: bool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self {
            spoken: Mutex::new(Vec::new()),
            playback: Duration::ZERO,
            fail: false,
        }
    }

    pub fn with_playback(mut self, playback: Duration) -> Self {
        self.playback = playback;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputChannel for RecordingOutput {
    fn name(&self) -> &str {
        "recording"
    }

    async fn speak(&self, text: &str) -> Result<(), ChannelError> {
        self.spoken.lock().unwrap().push(text.to_string());
        if !self.playback.is_zero() {
            tokio::time::sleep(self.playback).await;
        }
        if self.fail {
            return Err(ChannelError::OutputFailed {
                channel: "recording".into(),
                reason: "speaker unplugged".into(),
            });
        }
        Ok(())
    }
}
