mod processor;
mod splitter;
mod types;

pub use processor::{normalize_mime, Document, DocumentProcessor, MIME_PDF, MIME_TEXT};
pub use splitter::{TextSplitter, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use types::{source_metadata, DocumentChunk, Metadata, SOURCE_KEY};
