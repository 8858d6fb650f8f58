use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_CONCURRENCY};
use crate::error::{RagError, Result};
use crate::providers::traits::EmbeddingProvider;

/// Limits applied when embedding many texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum texts per provider request.
    pub max_batch_size: usize,
    /// Maximum provider requests in flight.
    pub max_concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

struct BatchOutcome {
    index: usize,
    result: Result<Vec<Vec<f64>>>,
}

/// Embeds arbitrarily many texts through size-bounded batches run with
/// bounded concurrency. Output position `i` always belongs to input `i`.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
    options: BatchOptions,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: BatchOptions) -> Result<Self> {
        if options.max_batch_size == 0 || options.max_concurrency == 0 {
            return Err(RagError::Config(
                "max_batch_size and max_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(Self { provider, options })
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn options(&self) -> BatchOptions {
        self.options
    }

    pub async fn generate_embedding(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f64>> {
        self.provider.embed_one(text, cancel).await
    }

    pub async fn generate_batch_embeddings(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<f64>>> {
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }
        if texts.len() <= self.options.max_batch_size {
            return self.provider.embed_many(texts, cancel).await;
        }
        self.embed_in_parallel(texts, cancel).await
    }

    async fn embed_in_parallel(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        let batch_size = self.options.max_batch_size;
        let batch_count = texts.len().div_ceil(batch_size);
        info!(
            texts = texts.len(),
            batches = batch_count,
            max_concurrency = self.options.max_concurrency,
            "embedding in parallel batches"
        );

        // Failing batches cancel their siblings without touching the caller's token.
        let batch_cancel = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));
        let (tx, mut rx) = mpsc::channel::<BatchOutcome>(batch_count);

        for (index, batch) in texts.chunks(batch_size).enumerate() {
            let batch = batch.to_vec();
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let cancel = batch_cancel.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(RagError::Cancelled),
                    permit = semaphore.acquire_owned() => match permit {
                        // The permit is released when `_permit` drops, on every path.
                        Ok(_permit) => {
                            if cancel.is_cancelled() {
                                Err(RagError::Cancelled)
                            } else {
                                debug!(batch = index, size = batch.len(), "embedding batch");
                                provider.embed_many(&batch, &cancel).await
                            }
                        }
                        Err(_) => Err(RagError::Cancelled),
                    },
                };
                let _ = tx.send(BatchOutcome { index, result }).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<Vec<Vec<f64>>>> = vec![None; batch_count];
        let mut first_error: Option<RagError> = None;
        let mut cancelled: Option<RagError> = None;

        while let Some(BatchOutcome { index, result }) = rx.recv().await {
            match result {
                Ok(embeddings) => slots[index] = Some(embeddings),
                Err(err) => {
                    let start = index * batch_size;
                    let end = (start + batch_size).min(texts.len());
                    let annotated = RagError::Batch {
                        index,
                        start,
                        end,
                        source: Box::new(err),
                    };
                    if annotated.is_cancelled() {
                        cancelled.get_or_insert(annotated);
                    } else if first_error.is_none() {
                        warn!(batch = index, error = %annotated, "batch failed, cancelling remaining batches");
                        batch_cancel.cancel();
                        first_error = Some(annotated);
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }
        if let Some(err) = cancelled {
            return Err(err);
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(batch) => embeddings.extend(batch),
                None => {
                    return Err(RagError::provider(
                        "embedding",
                        format!("batch {} worker exited without a result", index),
                    ))
                }
            }
        }

        if embeddings.len() != texts.len() {
            return Err(RagError::MismatchedCardinality {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }
}
