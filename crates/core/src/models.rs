use serde::{Deserialize, Serialize};

/// A contiguous span of page text, the unit of embedding. Transient:
/// only its vector and metadata projection are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    pub page_number: u32,
    pub source_offset: Option<usize>,
}

/// Metadata persisted alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub text: String,
    pub page_number: u32,
}

/// A persisted `(id, vector, metadata)` triple. `id` is unique within its
/// namespace; re-upserting the same id overwrites the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// One retrieval hit, ranked descending by score (cosine similarity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub page_number: u32,
    pub score: f32,
}

/// The one place the conversation-to-partition mapping is defined. Every
/// upsert, query, and delete for a conversation goes through this key.
pub fn chat_namespace(chat_id: &str) -> String {
    format!("chat-{chat_id}")
}

#[cfg(test)]
mod tests {
    use super::chat_namespace;

    #[test]
    fn namespace_key_is_prefixed_chat_id() {
        assert_eq!(chat_namespace("42"), "chat-42");
        assert_eq!(chat_namespace("abc-def"), "chat-abc-def");
    }
}
