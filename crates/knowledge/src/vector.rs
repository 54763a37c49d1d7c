//! Vector similarity.
//!
//! Exact cosine similarity; the corpus is small enough (hundreds of chunks)
//! that a linear scan beats any approximate structure.

/// Cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal.
/// Returns `None` when the metric is undefined: mismatched lengths, empty
/// vectors, or a zero-norm side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return None;
    }

    Some((dot / denom) as f32)
}

/// Map cosine similarity into a [0, 1] relevance score.
///
/// Anti-correlated vectors carry no more relevance than orthogonal ones, so
/// negatives clamp to zero rather than being rescaled.
pub fn relevance(a: &[f32], b: &[f32]) -> Option<f32> {
    cosine_similarity(a, b).map(|s| s.clamp(0.0, 1.0))
}
