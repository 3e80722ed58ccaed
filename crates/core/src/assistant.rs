use crate::completion::ChatCompletion;
use crate::embeddings::EmbeddingClient;
use crate::error::ChatError;
use crate::responder::{GroundedAnswer, GroundedResponder, OutputShape};
use crate::retrieval::RetrievalService;
use crate::traits::VectorIndex;

/// One entry point per user message: retrieve whatever document context
/// the conversation has, then answer grounded in it or fall back to the
/// generic prompt. This is the surface an HTTP route handler calls.
pub struct ChatAssistant<E, V, C>
where
    E: EmbeddingClient,
    V: VectorIndex,
    C: ChatCompletion,
{
    retrieval: RetrievalService<E, V>,
    responder: GroundedResponder<C>,
}

impl<E, V, C> ChatAssistant<E, V, C>
where
    E: EmbeddingClient,
    V: VectorIndex,
    C: ChatCompletion,
{
    pub fn new(retrieval: RetrievalService<E, V>, responder: GroundedResponder<C>) -> Self {
        Self {
            retrieval,
            responder,
        }
    }

    pub async fn respond(&self, chat_id: &str, message: &str) -> Result<GroundedAnswer, ChatError> {
        self.respond_shaped(chat_id, message, &OutputShape::PlainText)
            .await
    }

    pub async fn respond_shaped(
        &self,
        chat_id: &str,
        message: &str,
        shape: &OutputShape,
    ) -> Result<GroundedAnswer, ChatError> {
        let context = self.retrieval.relevant_context(message, chat_id).await?;
        self.responder.answer(&context.text, message, shape).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::CompletionError;
    use crate::models::{ChunkMetadata, IndexEntry};
    use crate::responder::ResponderConfig;
    use crate::retry::BackoffPolicy;
    use crate::stores::InMemoryIndex;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StaticChat;

    #[async_trait]
    impl ChatCompletion for StaticChat {
        async fn complete(
            &self,
            _request: &crate::completion::CompletionRequest,
        ) -> Result<String, CompletionError> {
            Ok("a reply".to_string())
        }
    }

    fn assistant_over(
        index: Arc<InMemoryIndex>,
    ) -> ChatAssistant<HashedNgramEmbedder, Arc<InMemoryIndex>, StaticChat> {
        let mut config = ResponderConfig::new("test-chat");
        config.backoff = BackoffPolicy::None;
        ChatAssistant::new(
            RetrievalService::new(HashedNgramEmbedder::default(), index),
            GroundedResponder::new(StaticChat, config),
        )
    }

    #[tokio::test]
    async fn conversation_without_a_document_answers_ungrounded() {
        let assistant = assistant_over(Arc::new(InMemoryIndex::new()));

        let answer = assistant.respond("1", "what is this about?").await.unwrap();

        assert_eq!(answer.text, "a reply");
        assert!(!answer.has_context);
    }

    #[tokio::test]
    async fn conversation_with_a_document_answers_grounded() {
        let index = Arc::new(InMemoryIndex::new());
        let embedder = HashedNgramEmbedder::default();
        let text = "zebra stripes and habitat in the savanna grasslands of east africa";
        let vectors = embedder.embed(&[text.to_string()]).await.unwrap();
        index
            .upsert(
                "chat-1",
                &[IndexEntry {
                    id: "e1".to_string(),
                    vector: vectors.into_iter().next().unwrap(),
                    metadata: ChunkMetadata {
                        text: text.to_string(),
                        page_number: 2,
                    },
                }],
            )
            .await
            .unwrap();

        let assistant = assistant_over(index);
        let answer = assistant
            .respond("1", "zebra stripes habitat savanna")
            .await
            .unwrap();

        assert!(answer.has_context);
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let assistant = assistant_over(Arc::new(InMemoryIndex::new()));
        let result = assistant.respond("1", "   ").await;
        assert!(matches!(result, Err(ChatError::InvalidRequest(_))));
    }
}
