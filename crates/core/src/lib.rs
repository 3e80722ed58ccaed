pub mod assistant;
pub mod chunking;
pub mod completion;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod responder;
pub mod retrieval;
pub mod retry;
pub mod stores;
pub mod traits;

pub use assistant::ChatAssistant;
pub use chunking::{
    chunk_page, normalize_text, page_is_decodable, ChunkingConfig, DEFAULT_CHUNK_OVERLAP,
    DEFAULT_CHUNK_SIZE,
};
pub use completion::{
    ChatCompletion, ChatMessage, CompletionRequest, CompletionServiceConfig, HttpChatClient, Role,
};
pub use conversation::{
    ConversationRecord, ConversationStore, DocumentAttachment, InMemoryConversationStore,
};
pub use embeddings::{
    EmbeddingClient, EmbeddingServiceConfig, HashedNgramEmbedder, HttpEmbeddingClient,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{
    ChatError, CompletionError, ConversationError, EmbeddingError, IndexError, IngestError,
    IngestStage,
};
pub use extractor::{LopdfExtractor, OcrEndpointConfig, OcrFallbackClient, PageText, PdfExtractor};
pub use ingest::{IngestRequest, IngestionOptions, IngestionPipeline, IngestionReport};
pub use models::{chat_namespace, ChunkMetadata, DocumentChunk, IndexEntry, ScoredChunk};
pub use responder::{
    GroundedAnswer, GroundedResponder, OutputShape, ParsedReply, ResponderConfig,
    GENERATION_APOLOGY, MIN_CONTEXT_CHARS,
};
pub use retrieval::{RetrievalConfig, RetrievalService, RetrievedContext, DEFAULT_TOP_K};
pub use retry::BackoffPolicy;
pub use stores::{InMemoryIndex, QdrantConfig, QdrantIndex};
pub use traits::VectorIndex;
