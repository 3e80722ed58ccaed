use crate::error::IndexError;
use crate::models::{IndexEntry, ScoredChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local vector index keeping each namespace in its own bucket.
/// Backs offline operation and the isolation/idempotency tests; ranking is
/// plain cosine similarity.
#[derive(Default)]
pub struct InMemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<IndexEntry>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, Vec::len)
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    let mut dot = 0f32;
    let mut left_norm = 0f32;
    let mut right_norm = 0f32;
    for (a, b) in left.iter().zip(right.iter()) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }

    let magnitude = left_norm.sqrt() * right_norm.sqrt();
    if magnitude == 0.0 {
        0.0
    } else {
        dot / magnitude
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let mut namespaces = self.namespaces.write().await;
        let bucket = namespaces.entry(namespace.to_string()).or_default();

        for entry in entries {
            match bucket.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => *existing = entry.clone(),
                None => bucket.push(entry.clone()),
            }
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let namespaces = self.namespaces.read().await;
        let Some(bucket) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredChunk> = bucket
            .iter()
            .map(|entry| ScoredChunk {
                text: entry.metadata.text.clone(),
                page_number: entry.metadata.page_number,
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), IndexError> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;

    fn entry(id: &str, vector: Vec<f32>, text: &str, page_number: u32) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                text: text.to_string(),
                page_number,
            },
        }
    }

    #[tokio::test]
    async fn query_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(
                "chat-1",
                &[
                    entry("a", vec![1.0, 0.0], "exact", 1),
                    entry("b", vec![0.0, 1.0], "orthogonal", 2),
                    entry("c", vec![0.7, 0.7], "diagonal", 3),
                ],
            )
            .await
            .unwrap();

        let hits = index.query("chat-1", &[1.0, 0.0], 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "exact");
        assert_eq!(hits[1].text, "diagonal");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let index = InMemoryIndex::new();
        index
            .upsert("chat-a", &[entry("a", vec![1.0, 0.0], "alpha doc", 1)])
            .await
            .unwrap();
        index
            .upsert("chat-b", &[entry("b", vec![1.0, 0.0], "beta doc", 1)])
            .await
            .unwrap();

        let hits = index.query("chat-a", &[1.0, 0.0], 10).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "alpha doc");
        assert!(hits.iter().all(|hit| hit.text != "beta doc"));
    }

    #[tokio::test]
    async fn upsert_with_same_id_overwrites() {
        let index = InMemoryIndex::new();
        index
            .upsert("chat-1", &[entry("a", vec![1.0, 0.0], "first", 1)])
            .await
            .unwrap();
        index
            .upsert("chat-1", &[entry("a", vec![1.0, 0.0], "second", 1)])
            .await
            .unwrap();

        assert_eq!(index.entry_count("chat-1").await, 1);
        let hits = index.query("chat-1", &[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "second");
    }

    #[tokio::test]
    async fn missing_namespace_queries_empty() {
        let index = InMemoryIndex::new();
        let hits = index.query("chat-none", &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_missing_namespace_is_a_noop() {
        let index = InMemoryIndex::new();
        index.delete_namespace("chat-none").await.unwrap();
    }

    #[tokio::test]
    async fn delete_clears_only_the_target_namespace() {
        let index = InMemoryIndex::new();
        index
            .upsert("chat-a", &[entry("a", vec![1.0], "alpha", 1)])
            .await
            .unwrap();
        index
            .upsert("chat-b", &[entry("b", vec![1.0], "beta", 1)])
            .await
            .unwrap();

        index.delete_namespace("chat-a").await.unwrap();

        assert_eq!(index.entry_count("chat-a").await, 0);
        assert_eq!(index.entry_count("chat-b").await, 1);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
