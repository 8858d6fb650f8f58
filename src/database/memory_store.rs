use async_trait::async_trait;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::vector_db::{cosine_similarity, ScoredChunk, VectorStore};
use crate::document::DocumentChunk;
use crate::error::Result;

/// Append-only in-process store guarded by a readers-writer lock.
///
/// Chunks are never mutated after insertion, so searches hand out shared
/// references instead of copies.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<Vec<Arc<DocumentChunk>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Best score first; equal scores keep insertion order.
fn rank(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let incoming: Vec<Arc<DocumentChunk>> = chunks.into_iter().map(Arc::new).collect();
        let count = incoming.len();

        let mut guard = self.chunks.write().await;
        guard.extend(incoming);
        debug!(added = count, total = guard.len(), "stored chunks");
        Ok(())
    }

    async fn search(&self, query: &[f64], limit: usize) -> Result<Vec<ScoredChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let guard = self.chunks.read().await;

        let mut scored: Vec<(usize, f64)> = guard
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.embedding.is_empty())
            .map(|(position, chunk)| (position, cosine_similarity(query, &chunk.embedding)))
            .collect();

        // Partial selection keeps large stores at O(n) before the final sort.
        if scored.len() > limit {
            scored.select_nth_unstable_by(limit - 1, rank);
            scored.truncate(limit);
        }
        scored.sort_by(rank);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: Arc::clone(&guard[position]),
                score,
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }
}
