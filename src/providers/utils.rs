use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::{RagError, Result};

/// Widen a provider's 32-bit vector to the 64-bit floats stored everywhere else.
pub fn widen_embedding(embedding: Vec<f32>) -> Vec<f64> {
    embedding.into_iter().map(f64::from).collect()
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Build a provider error from a non-success HTTP response.
///
/// OpenAI-compatible APIs wrap failures in `{"error": {"message": ...}}`;
/// anything else is reported verbatim.
pub async fn error_from_response(provider: &str, response: reqwest::Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    RagError::provider(provider, format!("API request failed: Status {}, Body: {}", status, detail))
}

/// POST `body` as JSON with bearer auth and decode the JSON reply.
///
/// Both the round trip and the body read race against `cancel`.
pub async fn post_json<B, T>(
    provider: &str,
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
    cancel: &CancellationToken,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let request = client.post(url).bearer_auth(api_key).json(body).send();

    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(RagError::Cancelled),
        response = request => response.map_err(|e| {
            error!(provider, error = %e, "request failed");
            RagError::provider(provider, format!("request failed: {}", e))
        })?,
    };

    if !response.status().is_success() {
        let err = error_from_response(provider, response).await;
        error!(provider, error = %err, "API error");
        return Err(err);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        parsed = response.json::<T>() => parsed.map_err(|e| {
            RagError::provider(provider, format!("failed to parse response: {}", e))
        }),
    }
}
