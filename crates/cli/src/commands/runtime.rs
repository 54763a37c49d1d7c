//! Shared wiring: config → backends → indexed corpus → turn engine.

use std::path::PathBuf;
use std::sync::Arc;

use parley_agent::TurnEngine;
use parley_config::{AppConfig, KnowledgeConfig};
use parley_core::event::EventBus;
use parley_knowledge::loader::expand_paths;
use parley_knowledge::{ChunkPolicy, Chunker, Source, build_corpus, builtin};
use tracing::{info, warn};

/// Everything a command needs to answer questions.
pub struct Runtime {
    pub config: AppConfig,
    pub engine: Arc<TurnEngine>,
    pub events: Arc<EventBus>,
}

/// Load config from disk and build the runtime.
pub async fn load() -> Result<Runtime, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    build(config).await
}

pub async fn build(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let backends = parley_providers::build_from_config(&config)?;
    let events = Arc::new(EventBus::default());

    let chunker = Chunker::new(ChunkPolicy::new(
        config.knowledge.chunk_size,
        config.knowledge.overlap,
    )?);
    let corpus = build_corpus(
        knowledge_sources(&config.knowledge, &[]),
        chunker,
        backends.embedder.clone(),
        Some(&events),
    )
    .await?;
    for error in &corpus.errors {
        warn!(error = %error, "Source rejected");
    }
    info!(
        fragments = corpus.fragments,
        chunks = corpus.index.len(),
        rejected = corpus.errors.len(),
        "Knowledge ready"
    );

    let engine = TurnEngine::from_config(&config, corpus.index, backends.generator)
        .with_events(events.clone());

    Ok(Runtime {
        config,
        engine: Arc::new(engine),
        events,
    })
}

/// Built-in knowledge (if enabled) plus configured and `extra` documents.
///
/// Unreadable files are logged and skipped.
pub fn knowledge_sources(knowledge: &KnowledgeConfig, extra: &[PathBuf]) -> Vec<Source> {
    let mut sources = if knowledge.include_builtin {
        builtin::sources()
    } else {
        Vec::new()
    };
    sources.extend(read_documents(&knowledge.documents));
    sources.extend(read_documents(extra));
    sources
}

pub fn read_documents(paths: &[PathBuf]) -> Vec<Source> {
    expand_paths(paths)
        .iter()
        .filter_map(|path| match Source::from_path(path) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping document");
                None
            }
        })
        .collect()
}
