//! `parley ingest`: Index documents and report the result.

use std::path::PathBuf;

use parley_config::AppConfig;
use parley_core::message::History;
use parley_knowledge::{ChunkPolicy, Chunker, RetrievalPolicy, Retriever, build_corpus};

use super::runtime::read_documents;

pub async fn run(paths: &[PathBuf], query: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let embedder = parley_providers::build_embedder(&config.embedding)?;

    let sources = read_documents(paths);
    let submitted = sources.len();
    let chunker = Chunker::new(ChunkPolicy::new(
        config.knowledge.chunk_size,
        config.knowledge.overlap,
    )?);
    let corpus = build_corpus(sources, chunker, embedder, None).await?;

    println!("Ingested {submitted} document(s)");
    println!("   Fragments: {}", corpus.fragments);
    println!("   Chunks:    {}", corpus.index.len());
    if let Some(dimension) = corpus.index.dimension() {
        println!("   Dimension: {dimension}");
    }
    for error in &corpus.errors {
        println!("   Rejected:  {error}");
    }

    let Some(query) = query else {
        return Ok(());
    };

    let policy = RetrievalPolicy {
        top_k: config.knowledge.top_k,
        min_relevance: config.knowledge.min_relevance,
        unscored_confidence: config.knowledge.unscored_confidence,
        ..RetrievalPolicy::default()
    };
    let retrieval = Retriever::new(corpus.index, policy)
        .retrieve(query, &History::new())
        .await?;

    println!();
    println!("Query: {query}   (confidence {}%)", retrieval.confidence);
    if retrieval.is_empty() {
        println!("   No relevant chunks.");
    }
    for (rank, hit) in retrieval.fragments.iter().enumerate() {
        let score = hit
            .score
            .map(|s| format!("{s:.3}"))
            .unwrap_or_else(|| "-".into());
        println!("{:>3}. [{}] score {score}", rank + 1, hit.source_id());
        println!("     {}", preview(&hit.chunk.text, 160));
    }
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b\tc", 10), "a b c");
        assert_eq!(preview(&"x".repeat(20), 5), "xxxxx...");
    }
}
