use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{RagError, Result};
use crate::providers::traits::CompletionProvider;
use crate::providers::utils::post_json;

const PROVIDER: &str = "DeepSeek";

/// Single-turn chat completions against a DeepSeek (OpenAI-compatible) endpoint.
///
/// Requests use `temperature = 0` so identical prompts decode identically.
#[derive(Clone)]
pub struct DeepSeekProvider {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: String,
}

impl DeepSeekProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::provider(PROVIDER, format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.api_url),
        })
    }
}

#[async_trait]
impl CompletionProvider for DeepSeekProvider {
    async fn complete(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0
        });

        let response: ChatResponse =
            post_json(PROVIDER, &self.client, &self.endpoint, &self.api_key, &body, cancel).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RagError::EmptyResponse {
                provider: PROVIDER.to_string(),
            })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
