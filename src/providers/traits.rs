use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A remote embedding model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text. Fails with `EmptyResponse` when the provider returns no data.
    async fn embed_one(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f64>>;

    /// Embed many texts in one request, returning vectors in input order.
    ///
    /// Fails with `InvalidInput` for an empty slice and `MismatchedCardinality`
    /// when the provider returns a different number of vectors.
    async fn embed_many(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f64>>>;

    fn model(&self) -> &str;
}

/// A remote chat model answering single-turn prompts.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, cancel: &CancellationToken) -> Result<String>;

    fn model(&self) -> &str;
}
