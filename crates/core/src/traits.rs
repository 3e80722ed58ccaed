use crate::error::IndexError;
use crate::models::{IndexEntry, ScoredChunk};
use async_trait::async_trait;
use std::sync::Arc;

/// Namespaced vector storage. The namespace is the multi-tenancy boundary:
/// implementations must never let a query observe entries written under a
/// different namespace.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent per entry id: re-upserting an id overwrites it.
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<(), IndexError>;

    /// At most `top_k` hits, descending score. An empty or absent
    /// namespace yields an empty sequence, not an error.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Removes every entry under the namespace. Safe on a namespace that
    /// does not exist.
    async fn delete_namespace(&self, namespace: &str) -> Result<(), IndexError>;
}

#[async_trait]
impl<T> VectorIndex for Arc<T>
where
    T: VectorIndex + ?Sized,
{
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<(), IndexError> {
        self.as_ref().upsert(namespace, entries).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        self.as_ref().query(namespace, vector, top_k).await
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), IndexError> {
        self.as_ref().delete_namespace(namespace).await
    }
}
