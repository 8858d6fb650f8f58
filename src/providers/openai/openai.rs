use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{RagError, Result};
use crate::providers::traits::EmbeddingProvider;
use crate::providers::utils::{post_json, widen_embedding};

const PROVIDER: &str = "OpenAI";

/// Embeddings through the OpenAI `/embeddings` endpoint.
///
/// No retries: transport and HTTP failures surface to the caller.
#[derive(Clone)]
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Many(&'a [String]),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAIEmbeddingProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::provider(PROVIDER, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!("{}/embeddings", config.api_url),
        })
    }

    async fn request(&self, input: EmbeddingInput<'_>, cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input,
        };
        let response: EmbeddingResponse =
            post_json(PROVIDER, &self.client, &self.endpoint, &self.api_key, &body, cancel).await?;

        let mut data = response.data;
        // The API documents input order; honour explicit indices when present.
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        Ok(data.into_iter().map(|d| widen_embedding(d.embedding)).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_one(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<f64>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding single text");

        self.request(EmbeddingInput::Single(text), cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmptyResponse {
                provider: PROVIDER.to_string(),
            })
    }

    async fn embed_many(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Err(RagError::InvalidInput("no texts to embed".to_string()));
        }
        debug!(provider = PROVIDER, model = %self.model, batch_size = texts.len(), "embedding batch");

        let embeddings = self.request(EmbeddingInput::Many(texts), cancel).await?;
        if embeddings.len() != texts.len() {
            return Err(RagError::MismatchedCardinality {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }
        Ok(embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
