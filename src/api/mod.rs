mod error;

pub use error::{ApiError, ErrorCode, ErrorResponse};

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::document::{source_metadata, DocumentChunk, DocumentProcessor, Metadata};
use crate::llm::RagPipeline;

/// Largest accepted upload, per file.
pub const MAX_FILE_SIZE: usize = 10 << 20;
/// Request body cap: one maximum-size file plus multipart framing.
const MAX_BODY_SIZE: usize = MAX_FILE_SIZE + (64 << 10);

const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
    processor: DocumentProcessor,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1), custom = "not_blank")]
    question: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SourceChunk {
    id: String,
    content: String,
    metadata: Metadata,
}

impl From<&DocumentChunk> for SourceChunk {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            id: chunk.id.clone(),
            content: chunk.content.clone(),
            metadata: Arc::clone(&chunk.metadata),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    answer: String,
    sources: Vec<SourceChunk>,
    confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    id: String,
    name: String,
    chunks_count: usize,
    uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    document: DocumentSummary,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    chunks: usize,
}

/// Create and configure the API router
pub fn create_api(pipeline: Arc<RagPipeline>) -> Router {
    let state = AppState {
        pipeline,
        processor: DocumentProcessor::new(),
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            ALLOWED_ORIGINS.into_iter().map(HeaderValue::from_static),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // Wildcard headers are not allowed together with credentials.
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let api = Router::new()
        .route("/upload", post(upload_handler))
        .route("/query", post(query_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        chunks: state.pipeline.vector_store().len().await,
    })
}

async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let multipart = multipart.map_err(|e| {
        warn!(error = %e, "upload is not a multipart form");
        no_file()
    })?;
    let (file_name, content_type, bytes) = read_file_field(multipart).await?;
    info!(file = %file_name, content_type = %content_type, size = bytes.len(), "upload received");

    // Fires if the client disconnects and this future is dropped mid-ingest.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let content = state
        .processor
        .decode(bytes, &content_type)
        .await
        .map_err(|e| ApiError::internal(ErrorCode::Processing, "Failed to process document", &e))?;

    let mut document = state.processor.create_document(content, &file_name);

    let chunks = state
        .pipeline
        .process_document(&document.content, source_metadata(file_name.as_str()), &cancel)
        .await
        .map_err(|e| ApiError::internal(ErrorCode::Chunking, "Failed to process document chunks", &e))?;

    state
        .pipeline
        .add_to_vector_store(chunks.clone())
        .await
        .map_err(|e| ApiError::internal(ErrorCode::Storage, "Failed to store document chunks", &e))?;

    document.chunks = chunks;
    info!(document.id = %document.id, chunks = document.chunks.len(), "document ingested");

    Ok(Json(UploadResponse {
        document: DocumentSummary {
            id: document.id,
            name: document.name,
            chunks_count: document.chunks.len(),
            uploaded_at: document.uploaded_at,
        },
    }))
}

/// Pull the `file` field out of the form as (file name, content type, bytes).
async fn read_file_field(mut multipart: Multipart) -> Result<(String, String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = read_limited(field).await?;
        return Ok((file_name, content_type, bytes));
    }
    Err(no_file())
}

async fn read_limited(mut field: Field<'_>) -> Result<Vec<u8>, ApiError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > MAX_FILE_SIZE {
            return Err(file_too_large());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return file_too_large();
    }
    warn!(error = %err, "malformed multipart body");
    no_file()
}

fn no_file() -> ApiError {
    ApiError::bad_request(ErrorCode::NoFile, "No file provided")
}

fn file_too_large() -> ApiError {
    ApiError::bad_request(
        ErrorCode::FileTooLarge,
        format!("File too large. Maximum size is {}", format_file_size(MAX_FILE_SIZE as u64)),
    )
}

/// `10MB` for whole megabytes, `1.5MB` otherwise.
pub fn format_file_size(bytes: u64) -> String {
    const MB: u64 = 1 << 20;
    if bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    }
}

async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "rejected query body");
        ApiError::bad_request(ErrorCode::InvalidRequest, "Question is required and must be a string")
    })?;

    if request.validate().is_err() {
        return Err(ApiError::bad_request(ErrorCode::EmptyQuestion, "Question cannot be empty"));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let response = state
        .pipeline
        .query(&request.question, &cancel)
        .await
        .map_err(|e| ApiError::internal(ErrorCode::Query, "Failed to process query", &e))?;

    Ok(Json(QueryResponse {
        answer: response.answer,
        sources: response.sources.iter().map(|chunk| SourceChunk::from(chunk.as_ref())).collect(),
        confidence: response.confidence,
    }))
}
