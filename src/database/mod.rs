pub mod memory_store;
pub mod vector_db;

pub use memory_store::InMemoryVectorStore;
pub use vector_db::{cosine_similarity, ScoredChunk, VectorStore};
