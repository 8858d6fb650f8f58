use thiserror::Error;

/// Errors produced by the ingestion and retrieval pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    MismatchedCardinality { expected: usize, actual: usize },

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error("No text could be extracted from the document")]
    NoExtractableText,

    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed to generate embeddings for batch {index} (chunks {start}..{end}): {source}")]
    Batch {
        index: usize,
        start: usize,
        end: usize,
        #[source]
        source: Box<RagError>,
    },

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Prefix the error with the name of the stage that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        RagError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True when the root cause is a cancellation, looking through wrappers.
    pub fn is_cancelled(&self) -> bool {
        match self {
            RagError::Cancelled => true,
            RagError::Batch { source, .. } | RagError::Context { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
