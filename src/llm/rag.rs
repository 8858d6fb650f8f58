use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::RagSettings;
use crate::database::vector_db::{ScoredChunk, VectorStore};
use crate::document::{DocumentChunk, Metadata, TextSplitter, SOURCE_KEY};
use crate::error::{RagError, Result};
use crate::llm::embeddings::{BatchOptions, EmbeddingGenerator};
use crate::providers::traits::{CompletionProvider, EmbeddingProvider};

/// Placeholder confidence reported with every answer.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

const NO_ANSWER_INSTRUCTION: &str = "Please answer the question based on the context provided. \
If the answer is not in the context, say \"I don't have enough information to answer this question.\"";

/// An answer grounded in retrieved chunks.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub answer: String,
    /// Retrieved chunks, most similar first.
    pub sources: Vec<Arc<DocumentChunk>>,
    pub confidence: f64,
}

/// Ingest (split, embed, build chunks) and query (embed, search, prompt, complete).
pub struct RagPipeline {
    splitter: TextSplitter,
    embeddings: EmbeddingGenerator,
    vector_store: Arc<dyn VectorStore>,
    chat: Arc<dyn CompletionProvider>,
    max_context_chunks: usize,
}

impl RagPipeline {
    pub fn new(
        settings: RagSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        chat: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        settings.validate()?;
        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
        let embeddings = EmbeddingGenerator::new(
            embedder,
            BatchOptions {
                max_batch_size: settings.max_batch_size,
                max_concurrency: settings.max_concurrency,
            },
        )?;

        Ok(Self {
            splitter,
            embeddings,
            vector_store,
            chat,
            max_context_chunks: settings.max_context_chunks,
        })
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Split and embed `content`. Nothing is stored; see [`RagPipeline::add_to_vector_store`].
    ///
    /// Chunk `i` gets the id `"{source}-chunk-{i}"`, where `source` is `metadata["source"]`.
    pub async fn process_document(
        &self,
        content: &str,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentChunk>> {
        let texts = self.splitter.split(content);
        let count = texts.len();
        let source = metadata.get(SOURCE_KEY).cloned().unwrap_or_default();

        let vectors = self
            .embeddings
            .generate_batch_embeddings(&texts, cancel)
            .await
            .and_then(|vectors| {
                // Chunk ids must stay dense, so a short reply fails the whole document.
                if vectors.len() == count {
                    Ok(vectors)
                } else {
                    Err(RagError::MismatchedCardinality {
                        expected: count,
                        actual: vectors.len(),
                    })
                }
            })
            .map_err(|e| {
                error!(source = %source, error = %e, "embedding failed during ingestion");
                let (start, end) = match &e {
                    RagError::Batch { start, end, .. } => (*start, *end),
                    _ => (0, count),
                };
                e.context(format!(
                    "failed to generate embedding for chunks {}..{} of {}",
                    start, end, source
                ))
            })?;

        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (content, embedding))| DocumentChunk {
                id: DocumentChunk::chunk_id(&source, index),
                content,
                embedding,
                metadata: Arc::clone(&metadata),
            })
            .collect();

        info!(source = %source, chunk_count = chunks.len(), "processed document");
        Ok(chunks)
    }

    pub async fn add_to_vector_store(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        let count = chunks.len();
        self.vector_store.store(chunks).await.map_err(|e| {
            error!(error = %e, "failed to store chunks");
            e.context("failed to store document chunks")
        })?;
        info!(chunk_count = count, "stored chunks");
        Ok(())
    }

    /// Process and store in one call. Returns the stored chunks.
    pub async fn ingest(
        &self,
        content: &str,
        metadata: Metadata,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentChunk>> {
        let chunks = self.process_document(content, metadata, cancel).await?;
        self.add_to_vector_store(chunks.clone()).await?;
        Ok(chunks)
    }

    /// Top-k retrieval for a question, without generating an answer.
    pub async fn retrieve(&self, question: &str, cancel: &CancellationToken) -> Result<Vec<ScoredChunk>> {
        let query_vector = self
            .embeddings
            .generate_embedding(question, cancel)
            .await
            .map_err(|e| e.context("failed to generate embedding for query"))?;

        self.vector_store
            .search(&query_vector, self.max_context_chunks)
            .await
            .map_err(|e| e.context("failed to search vector store"))
    }

    pub async fn query(&self, question: &str, cancel: &CancellationToken) -> Result<RagResponse> {
        let scored = self.retrieve(question, cancel).await.map_err(|e| {
            error!(error = %e, "retrieval failed");
            e
        })?;

        let sources: Vec<Arc<DocumentChunk>> = scored.into_iter().map(|s| s.chunk).collect();
        let prompt = build_prompt(&sources, question);

        let answer = self.chat.complete(&prompt, cancel).await.map_err(|e| {
            error!(error = %e, "completion failed");
            e.context("failed to generate response")
        })?;

        info!(source_count = sources.len(), "query answered");
        Ok(RagResponse {
            answer,
            sources,
            confidence: DEFAULT_CONFIDENCE,
        })
    }
}

/// Wrap retrieved passages and the question in the answering template.
pub fn build_prompt(sources: &[Arc<DocumentChunk>], question: &str) -> String {
    let context = sources
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information:\n{}\n\nQuestion: {}\n\n{}",
        context, question, NO_ANSWER_INSTRUCTION
    )
}
