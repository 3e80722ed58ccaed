use crate::error::ConversationError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// The denormalized per-conversation document state this core reads and
/// writes. Conversation lifecycle itself belongs to the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub chat_id: String,
    pub document_ref: Option<String>,
    pub document_checksum: Option<String>,
    /// Concatenated chunk text, kept as a crude fallback context source
    /// when vector retrieval yields nothing.
    pub context_blob: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DocumentAttachment {
    pub document_ref: String,
    pub document_checksum: String,
    pub context_blob: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, chat_id: &str) -> Result<Option<ConversationRecord>, ConversationError>;

    async fn attach_document(
        &self,
        chat_id: &str,
        attachment: DocumentAttachment,
    ) -> Result<(), ConversationError>;

    async fn clear_context(&self, chat_id: &str) -> Result<(), ConversationError>;
}

#[async_trait]
impl<T> ConversationStore for std::sync::Arc<T>
where
    T: ConversationStore + ?Sized,
{
    async fn get(&self, chat_id: &str) -> Result<Option<ConversationRecord>, ConversationError> {
        self.as_ref().get(chat_id).await
    }

    async fn attach_document(
        &self,
        chat_id: &str,
        attachment: DocumentAttachment,
    ) -> Result<(), ConversationError> {
        self.as_ref().attach_document(chat_id, attachment).await
    }

    async fn clear_context(&self, chat_id: &str) -> Result<(), ConversationError> {
        self.as_ref().clear_context(chat_id).await
    }
}

/// Map-backed store for the CLI and tests; a real deployment plugs its
/// relational store in behind the same trait.
#[derive(Default)]
pub struct InMemoryConversationStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, chat_id: &str) -> Result<Option<ConversationRecord>, ConversationError> {
        Ok(self.records.read().await.get(chat_id).cloned())
    }

    async fn attach_document(
        &self,
        chat_id: &str,
        attachment: DocumentAttachment,
    ) -> Result<(), ConversationError> {
        let mut records = self.records.write().await;
        records.insert(
            chat_id.to_string(),
            ConversationRecord {
                chat_id: chat_id.to_string(),
                document_ref: Some(attachment.document_ref),
                document_checksum: Some(attachment.document_checksum),
                context_blob: Some(attachment.context_blob),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn clear_context(&self, chat_id: &str) -> Result<(), ConversationError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(chat_id) {
            record.document_ref = None;
            record.document_checksum = None;
            record.context_blob = None;
            record.updated_at = Utc::now();
        }
        Ok(())
    }
}
