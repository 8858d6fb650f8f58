#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use rust_rag_server::config::RagSettings;
use rust_rag_server::database::{InMemoryVectorStore, ScoredChunk, VectorStore};
use rust_rag_server::document::DocumentChunk;
use rust_rag_server::error::{RagError, Result};
use rust_rag_server::llm::RagPipeline;
use rust_rag_server::providers::{CompletionProvider, EmbeddingProvider};

/// Embeds each text as `[len(text)]`, optionally sleeping and failing per text.
pub struct LengthEmbedder {
    delay: fn(&str) -> Duration,
    fail_on: Option<String>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl LengthEmbedder {
    pub fn new() -> Self {
        Self {
            delay: |_| Duration::ZERO,
            fail_on: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: fn(&str) -> Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail any batch containing `text`.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    async fn embed(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = texts.iter().map(|t| (self.delay)(t)).max().unwrap_or_default();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(RagError::Cancelled),
            _ = tokio::time::sleep(delay) => {
                if self.fail_on.as_ref().is_some_and(|bad| texts.contains(bad)) {
                    Err(RagError::provider("mock", "refused batch"))
                } else {
                    Ok(texts.iter().map(|t| vec![t.chars().count() as f64]).collect())
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    async fn embed_one(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f64>> {
        let mut vectors = self.embed(&[text.to_string()], cancel).await?;
        vectors.pop().ok_or(RagError::EmptyResponse {
            provider: "mock".to_string(),
        })
    }

    async fn embed_many(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Err(RagError::InvalidInput("no texts to embed".to_string()));
        }
        self.embed(texts, cancel).await
    }

    fn model(&self) -> &str {
        "length"
    }
}

/// Embeds text as counts of the letters a..z, so related texts score higher.
pub struct LetterEmbedder;

pub fn letter_counts(text: &str) -> Vec<f64> {
    let mut counts = vec![0.0; 26];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        counts[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    counts
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed_one(&self, text: &str, _cancel: &CancellationToken) -> Result<Vec<f64>> {
        Ok(letter_counts(text))
    }

    async fn embed_many(&self, texts: &[String], _cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Err(RagError::InvalidInput("no texts to embed".to_string()));
        }
        Ok(texts.iter().map(|t| letter_counts(t)).collect())
    }

    fn model(&self) -> &str {
        "letters"
    }
}

/// Embedder whose every call fails.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    async fn embed_one(&self, _text: &str, _cancel: &CancellationToken) -> Result<Vec<f64>> {
        Err(RagError::provider("mock", "embedding service unavailable"))
    }

    async fn embed_many(&self, _texts: &[String], _cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        Err(RagError::provider("mock", "embedding service unavailable"))
    }

    fn model(&self) -> &str {
        "broken"
    }
}

/// Embedder that drops the last vector of every batch.
pub struct ShortEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortEmbedder {
    async fn embed_one(&self, text: &str, _cancel: &CancellationToken) -> Result<Vec<f64>> {
        Ok(letter_counts(text))
    }

    async fn embed_many(&self, texts: &[String], _cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        Ok(texts.iter().skip(1).map(|t| letter_counts(t)).collect())
    }

    fn model(&self) -> &str {
        "short"
    }
}

/// Store that refuses every write and finds nothing.
pub struct ReadOnlyStore;

#[async_trait]
impl VectorStore for ReadOnlyStore {
    async fn store(&self, _chunks: Vec<DocumentChunk>) -> Result<()> {
        Err(RagError::Store("store is read-only".to_string()))
    }

    async fn search(&self, _query: &[f64], _limit: usize) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }

    async fn len(&self) -> usize {
        0
    }
}

/// Chat client that answers with the prompt it was given.
pub struct EchoChat;

#[async_trait]
impl CompletionProvider for EchoChat {
    async fn complete(&self, prompt: &str, _cancel: &CancellationToken) -> Result<String> {
        Ok(prompt.to_string())
    }

    fn model(&self) -> &str {
        "echo"
    }
}

/// Chat client that returns no choices.
pub struct SilentChat;

#[async_trait]
impl CompletionProvider for SilentChat {
    async fn complete(&self, _prompt: &str, _cancel: &CancellationToken) -> Result<String> {
        Err(RagError::EmptyResponse {
            provider: "mock".to_string(),
        })
    }

    fn model(&self) -> &str {
        "silent"
    }
}

pub fn pipeline_with(
    settings: RagSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn CompletionProvider>,
) -> RagPipeline {
    RagPipeline::new(settings, embedder, Arc::new(InMemoryVectorStore::new()), chat)
        .expect("valid pipeline settings")
}

pub fn pipeline_with_store(store: Arc<dyn VectorStore>) -> RagPipeline {
    RagPipeline::new(RagSettings::default(), Arc::new(LetterEmbedder), store, Arc::new(EchoChat))
        .expect("valid pipeline settings")
}

pub fn letter_pipeline() -> RagPipeline {
    pipeline_with(RagSettings::default(), Arc::new(LetterEmbedder), Arc::new(EchoChat))
}
