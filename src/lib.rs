pub mod api;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod llm;
pub mod providers;

// Re-export commonly used items
pub use config::{AppConfig, ProviderConfig, RagSettings};
pub use database::{InMemoryVectorStore, VectorStore};
pub use document::{DocumentChunk, DocumentProcessor, TextSplitter};
pub use error::{RagError, Result};
pub use llm::{RagPipeline, RagResponse};
