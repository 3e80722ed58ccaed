use crate::embeddings::EmbeddingClient;
use crate::error::ChatError;
use crate::models::{chat_namespace, ScoredChunk};
use crate::traits::VectorIndex;
use tracing::{debug, warn};

pub const DEFAULT_TOP_K: usize = 3;

/// Hits scoring below this are dropped as noise so top-k padding cannot
/// surface unrelated passages.
pub const MIN_RELEVANCE_SCORE: f32 = 0.20;

#[derive(Debug, Clone, Copy)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: MIN_RELEVANCE_SCORE,
        }
    }
}

/// Assembled context for one query. `text` is empty when nothing relevant
/// was found; callers fall back to ungrounded prompting in that case.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub text: String,
    pub hits: Vec<ScoredChunk>,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Read path: embeds the query, searches the conversation's namespace, and
/// assembles a bounded context string with page citations.
pub struct RetrievalService<E, V>
where
    E: EmbeddingClient,
    V: VectorIndex,
{
    embedder: E,
    index: V,
    config: RetrievalConfig,
}

impl<E, V> RetrievalService<E, V>
where
    E: EmbeddingClient,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self::with_config(embedder, index, RetrievalConfig::default())
    }

    pub fn with_config(embedder: E, index: V, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Embedding failures are terminal here (an interactive reply should
    /// not wait out retries), while index failures degrade to an empty
    /// context so a broken index never blocks the chat reply.
    pub async fn relevant_context(
        &self,
        query: &str,
        chat_id: &str,
    ) -> Result<RetrievedContext, ChatError> {
        if query.trim().is_empty() {
            return Err(ChatError::InvalidRequest("query is empty".to_string()));
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let Some(query_vector) = vectors.into_iter().next() else {
            return Err(ChatError::InvalidRequest(
                "embedder returned no vector for the query".to_string(),
            ));
        };

        let namespace = chat_namespace(chat_id);
        let hits = match self
            .index
            .query(&namespace, &query_vector, self.config.top_k)
            .await
        {
            Ok(hits) => hits,
            Err(error) => {
                warn!(%namespace, %error, "vector query failed, degrading to empty context");
                return Ok(RetrievedContext::default());
            }
        };

        let hits: Vec<ScoredChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.config.min_score)
            .collect();

        debug!(%namespace, hits = hits.len(), "retrieved context chunks");

        let text = hits
            .iter()
            .map(|hit| format!("Page {}: {}", hit.page_number, hit.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(RetrievedContext { text, hits })
    }
}
