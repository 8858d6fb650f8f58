use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata shared by value between every chunk of one ingest call.
pub type Metadata = Arc<HashMap<String, String>>;

/// Metadata key naming the document a chunk came from.
pub const SOURCE_KEY: &str = "source";

/// The unit of retrieval: a passage of an ingested document and its embedding.
///
/// An empty `embedding` is valid but makes the chunk invisible to search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `"{source}-chunk-{index}"`, see [`DocumentChunk::chunk_id`].
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f64>,
    pub metadata: Metadata,
}

impl DocumentChunk {
    pub fn chunk_id(source: &str, index: usize) -> String {
        format!("{}-chunk-{}", source, index)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// Build a metadata map holding only the document source.
pub fn source_metadata(source: impl Into<String>) -> Metadata {
    let mut metadata = HashMap::new();
    metadata.insert(SOURCE_KEY.to_string(), source.into());
    Arc::new(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_follow_source_and_index() {
        assert_eq!(DocumentChunk::chunk_id("geo.txt", 0), "geo.txt-chunk-0");
        assert_eq!(DocumentChunk::chunk_id("a b.pdf", 12), "a b.pdf-chunk-12");
    }

    #[test]
    fn empty_embedding_is_omitted_from_json() {
        let chunk = DocumentChunk {
            id: "x-chunk-0".to_string(),
            content: "hello".to_string(),
            embedding: Vec::new(),
            metadata: source_metadata("x"),
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["metadata"]["source"], "x");
        assert_eq!(chunk.source(), Some("x"));
    }
}
