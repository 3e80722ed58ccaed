use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding service returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vector index returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat completion returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
#[error("conversation store error: {0}")]
pub struct ConversationError(pub String);

/// Stage of the ingestion pipeline a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Extracting,
    Chunking,
    Embedding,
    Upserting,
    Persisting,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestStage::Received => "received",
            IngestStage::Extracting => "extracting",
            IngestStage::Chunking => "chunking",
            IngestStage::Embedding => "embedding",
            IngestStage::Upserting => "upserting",
            IngestStage::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),

    #[error("document contained no usable text after chunking")]
    EmptyDocument,

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index failed: {0}")]
    Index(#[from] IndexError),

    #[error("conversation update failed: {0}")]
    Conversation(#[from] ConversationError),
}

impl IngestError {
    /// The pipeline stage this error aborts, for diagnostics.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::InvalidRequest(_) | IngestError::InvalidChunkConfig(_) => {
                IngestStage::Received
            }
            IngestError::Extraction(_) | IngestError::OcrFailed(_) => IngestStage::Extracting,
            IngestError::EmptyDocument => IngestStage::Chunking,
            IngestError::Embedding(_) => IngestStage::Embedding,
            IngestError::Index(_) => IngestStage::Upserting,
            IngestError::Conversation(_) => IngestStage::Persisting,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("chat completion failed after {attempts} attempts: {last_error}")]
    Generation { attempts: u32, last_error: String },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
