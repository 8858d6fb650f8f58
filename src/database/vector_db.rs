use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::document::DocumentChunk;
use crate::error::Result;

/// A chunk paired with its cosine similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Arc<DocumentChunk>,
    pub score: f64,
}

/// Storage backend for embedded chunks with exact cosine search.
///
/// Any implementation must return scores in non-increasing order, skip chunks
/// without an embedding, break ties by insertion order, and return an empty
/// list (not an error) for an empty store or a zero `limit`.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append chunks. Concurrent searches see either none or all of them.
    async fn store(&self, chunks: Vec<DocumentChunk>) -> Result<()>;

    /// Return up to `limit` chunks ordered by similarity to `query`, best first.
    async fn search(&self, query: &[f64], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Number of stored chunks, including those without an embedding.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Cosine similarity `dot / (|a| * |b|)`.
///
/// Vectors of different length, or with a zero norm, score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if score == 0.0 {
        // Fold -0.0 into 0.0 so ordering stays total and stable.
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}
