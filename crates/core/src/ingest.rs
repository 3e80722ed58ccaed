use crate::chunking::{chunk_page, page_is_decodable, ChunkingConfig};
use crate::conversation::{ConversationStore, DocumentAttachment};
use crate::embeddings::EmbeddingClient;
use crate::error::IngestError;
use crate::extractor::{OcrFallbackClient, PdfExtractor};
use crate::models::{chat_namespace, ChunkMetadata, DocumentChunk, IndexEntry};
use crate::traits::VectorIndex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct IngestionOptions {
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub chat_id: String,
    pub pdf_bytes: Vec<u8>,
    /// Where the upload came from (filename or URL), recorded on the
    /// conversation.
    pub document_ref: String,
}

#[derive(Debug, Clone)]
pub struct IngestionReport {
    pub namespace: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub skipped_pages: Vec<u32>,
    pub document_checksum: String,
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write path: extract → chunk → embed → upsert → persist, strictly in
/// order, with every failure tagged by the stage it aborted
/// (`IngestError::stage`). All collaborators are injected, long-lived,
/// and shared across requests.
pub struct IngestionPipeline<X, E, V, C>
where
    X: PdfExtractor,
    E: EmbeddingClient,
    V: VectorIndex,
    C: ConversationStore,
{
    extractor: X,
    embedder: E,
    index: V,
    conversations: C,
    options: IngestionOptions,
    ocr_fallback: Option<OcrFallbackClient>,
}

impl<X, E, V, C> IngestionPipeline<X, E, V, C>
where
    X: PdfExtractor,
    E: EmbeddingClient,
    V: VectorIndex,
    C: ConversationStore,
{
    pub fn new(
        extractor: X,
        embedder: E,
        index: V,
        conversations: C,
        options: IngestionOptions,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            conversations,
            options,
            ocr_fallback: None,
        }
    }

    /// Route extraction failures through a multimodal OCR endpoint before
    /// giving up (scanned documents).
    pub fn with_ocr_fallback(mut self, client: OcrFallbackClient) -> Self {
        self.ocr_fallback = Some(client);
        self
    }

    /// Ingests an uploaded document into the conversation's namespace.
    ///
    /// Entry ids are freshly generated per run, so calling this twice for
    /// the same conversation accumulates a second copy of every chunk.
    /// Use [`replace`](Self::replace) to swap a document out.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestionReport, IngestError> {
        self.validate(request)?;

        let pages = self.extract(&request.pdf_bytes).await?;
        let page_count = pages.len();

        let mut chunks: Vec<DocumentChunk> = Vec::new();
        let mut skipped_pages = Vec::new();
        for page in &pages {
            if !page_is_decodable(&page.text) {
                warn!(page = page.number, "skipping undecodable page");
                skipped_pages.push(page.number);
                continue;
            }
            chunks.extend(chunk_page(&page.text, page.number, &self.options.chunking));
        }

        if chunks.is_empty() {
            return Err(IngestError::EmptyDocument);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let namespace = chat_namespace(&request.chat_id);
        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                metadata: ChunkMetadata {
                    text: chunk.text.clone(),
                    page_number: chunk.page_number,
                },
            })
            .collect();

        self.index.upsert(&namespace, &entries).await?;

        let document_checksum = digest_bytes(&request.pdf_bytes);
        let context_blob = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let attachment = DocumentAttachment {
            document_ref: request.document_ref.clone(),
            document_checksum: document_checksum.clone(),
            context_blob,
        };

        if let Err(error) = self
            .conversations
            .attach_document(&request.chat_id, attachment)
            .await
        {
            // A failed ingestion must not leave the document half-attached:
            // drop the vectors we just wrote before surfacing the error.
            if let Err(cleanup_error) = self.index.delete_namespace(&namespace).await {
                warn!(%namespace, %cleanup_error, "rollback of upserted vectors failed");
            }
            return Err(IngestError::Conversation(error));
        }

        info!(
            %namespace,
            pages = page_count,
            chunks = entries.len(),
            "document ingested"
        );

        Ok(IngestionReport {
            namespace,
            page_count,
            chunk_count: entries.len(),
            skipped_pages,
            document_checksum,
        })
    }

    /// Clears the conversation's namespace first, replacing any previously
    /// attached document instead of accumulating alongside it.
    pub async fn replace(&self, request: &IngestRequest) -> Result<IngestionReport, IngestError> {
        self.validate(request)?;
        self.index
            .delete_namespace(&chat_namespace(&request.chat_id))
            .await?;
        self.ingest(request).await
    }

    /// Removes the attached document entirely: clears the namespace and
    /// the conversation's denormalized context.
    pub async fn detach(&self, chat_id: &str) -> Result<(), IngestError> {
        if chat_id.trim().is_empty() {
            return Err(IngestError::InvalidRequest(
                "missing conversation id".to_string(),
            ));
        }

        self.index
            .delete_namespace(&chat_namespace(chat_id))
            .await?;
        self.conversations.clear_context(chat_id).await?;
        info!(chat_id, "document detached");
        Ok(())
    }

    fn validate(&self, request: &IngestRequest) -> Result<(), IngestError> {
        if request.chat_id.trim().is_empty() {
            return Err(IngestError::InvalidRequest(
                "missing conversation id".to_string(),
            ));
        }
        if request.pdf_bytes.is_empty() {
            return Err(IngestError::InvalidRequest(
                "missing document payload".to_string(),
            ));
        }
        self.options.chunking.validate()
    }

    async fn extract(&self, bytes: &[u8]) -> Result<Vec<crate::extractor::PageText>, IngestError> {
        match self.extractor.extract_pages(bytes) {
            Ok(pages) => Ok(pages),
            Err(IngestError::Extraction(parse_error)) => match &self.ocr_fallback {
                Some(ocr) => {
                    warn!(%parse_error, "extraction failed, trying multimodal OCR fallback");
                    ocr.extract_pages(bytes).await.map_err(|ocr_error| {
                        IngestError::Extraction(format!(
                            "{parse_error}; multimodal OCR fallback failed: {ocr_error}"
                        ))
                    })
                }
                None => Err(IngestError::Extraction(parse_error)),
            },
            Err(error) => Err(error),
        }
    }
}
