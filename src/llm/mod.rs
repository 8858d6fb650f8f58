pub mod embeddings;
pub mod rag;

pub use embeddings::{BatchOptions, EmbeddingGenerator};
pub use rag::{build_prompt, RagPipeline, RagResponse, DEFAULT_CONFIDENCE};
