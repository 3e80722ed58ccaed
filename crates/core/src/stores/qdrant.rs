use crate::error::IndexError;
use crate::models::{IndexEntry, ScoredChunk};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_size: usize,
    pub timeout: Duration,
}

impl QdrantConfig {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            vector_size,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Qdrant REST backend. All conversations share one collection; each
/// entry carries a `namespace` payload field and every query and delete
/// filters on it, which is what upholds the isolation invariant.
pub struct QdrantIndex {
    config: QdrantConfig,
    client: reqwest::Client,
}

impl QdrantIndex {
    pub fn new(config: QdrantConfig) -> Result<Self, IndexError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/collections/{}",
            self.config.endpoint, self.config.collection
        )
    }

    fn namespace_filter(namespace: &str) -> Value {
        json!({
            "must": [
                {"key": "namespace", "match": {"value": namespace}}
            ]
        })
    }

    /// Creates the backing collection if it does not exist yet. Intended
    /// to run once at startup.
    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let response = self.client.get(self.collection_url()).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }
        if !response.status().is_client_error() {
            return Err(backend_error(response).await);
        }

        debug!(collection = %self.config.collection, "creating qdrant collection");

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": {
                    "size": self.config.vector_size,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        Ok(())
    }
}

async fn backend_error(response: reqwest::Response) -> IndexError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    IndexError::Backend { status, body }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        let points = entries
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.id,
                    "vector": entry.vector,
                    "payload": {
                        "namespace": namespace,
                        "text": entry.metadata.text,
                        "page_number": entry.metadata.page_number,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
                "filter": Self::namespace_filter(namespace),
            }))
            .send()
            .await?;

        // A collection that was never created is an empty namespace, not
        // an error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for hit in hits {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let page_number = hit
                .pointer("/payload/page_number")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0) as f32;

            results.push(ScoredChunk {
                text,
                page_number,
                score,
            });
        }

        Ok(results)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<(), IndexError> {
        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&json!({ "filter": Self::namespace_filter(namespace) }))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        Ok(())
    }
}
