use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_chat_core::{
    ChatAssistant, ChatError, CompletionServiceConfig, EmbeddingServiceConfig, GroundedResponder,
    HttpChatClient, HttpEmbeddingClient, IngestRequest, IngestionOptions, IngestionPipeline,
    InMemoryConversationStore, LopdfExtractor, OcrEndpointConfig, OcrFallbackClient, QdrantConfig,
    QdrantIndex, ResponderConfig, RetrievalConfig, RetrievalService, GENERATION_APOLOGY,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding service endpoint (OpenAI-compatible).
    #[arg(
        long,
        env = "EMBEDDING_URL",
        default_value = "http://localhost:11434/v1/embeddings"
    )]
    embedding_url: String,

    /// Embedding model name.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Embedding vector size.
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "768")]
    embedding_dimensions: usize,

    /// Bearer token for the embedding service.
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Chat-completion endpoint (OpenAI-compatible).
    #[arg(
        long,
        env = "CHAT_URL",
        default_value = "http://localhost:11434/v1/chat/completions"
    )]
    chat_url: String,

    /// Chat model name.
    #[arg(long, env = "CHAT_MODEL", default_value = "llama3.2")]
    chat_model: String,

    /// Bearer token for the chat service.
    #[arg(long, env = "CHAT_API_KEY")]
    chat_api_key: Option<String>,

    /// Qdrant base URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection holding every conversation's vectors.
    #[arg(long, default_value = "chat_chunks")]
    qdrant_collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Attach a PDF to a conversation and index it for retrieval.
    Ingest {
        /// Conversation identifier.
        #[arg(long)]
        chat_id: String,
        /// Path to the PDF file.
        #[arg(long)]
        file: String,
        /// Clear the conversation's previous document first.
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Ask a question, grounded in the conversation's document when relevant.
    Ask {
        #[arg(long)]
        chat_id: String,
        #[arg(long)]
        message: String,
        /// Number of passages to retrieve.
        #[arg(long, default_value = "3")]
        top_k: usize,
    },
    /// Remove the conversation's document and clear its vectors.
    Forget {
        #[arg(long)]
        chat_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    let mut embedding_config = EmbeddingServiceConfig::new(
        &cli.embedding_url,
        &cli.embedding_model,
        cli.embedding_dimensions,
    );
    embedding_config.api_key = cli.embedding_api_key.clone();
    let embedder = HttpEmbeddingClient::new(embedding_config)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let index = Arc::new(
        QdrantIndex::new(QdrantConfig::new(
            &cli.qdrant_url,
            &cli.qdrant_collection,
            cli.embedding_dimensions,
        ))
        .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );
    let conversations = Arc::new(InMemoryConversationStore::new());

    match cli.command {
        Command::Ingest {
            chat_id,
            file,
            replace,
        } => {
            index
                .ensure_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let pdf_bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("could not read {file}"))?;

            let mut pipeline = IngestionPipeline::new(
                LopdfExtractor,
                embedder,
                index,
                conversations,
                IngestionOptions::default(),
            );
            if let Some(ocr_config) = OcrEndpointConfig::from_env() {
                info!(endpoint = %ocr_config.endpoint, "multimodal OCR fallback enabled");
                pipeline = pipeline.with_ocr_fallback(
                    OcrFallbackClient::new(ocr_config)
                        .map_err(|error| anyhow::anyhow!(error.to_string()))?,
                );
            }

            let request = IngestRequest {
                chat_id: chat_id.clone(),
                pdf_bytes,
                document_ref: file.clone(),
            };

            let result = if replace {
                pipeline.replace(&request).await
            } else {
                pipeline.ingest(&request).await
            };

            match result {
                Ok(report) => {
                    if !report.skipped_pages.is_empty() {
                        warn!(pages = ?report.skipped_pages, "some pages were skipped");
                    }
                    println!(
                        "{} chunks from {} page(s) indexed into {}",
                        report.chunk_count, report.page_count, report.namespace
                    );
                }
                Err(ingest_error) => {
                    error!(stage = %ingest_error.stage(), %ingest_error, "ingestion failed");
                    anyhow::bail!("could not process document: {ingest_error}");
                }
            }
        }
        Command::Ask {
            chat_id,
            message,
            top_k,
        } => {
            let retrieval = RetrievalService::with_config(
                embedder,
                index,
                RetrievalConfig {
                    top_k,
                    ..RetrievalConfig::default()
                },
            );

            let mut chat_config = CompletionServiceConfig::new(&cli.chat_url);
            chat_config.api_key = cli.chat_api_key.clone();
            let chat = HttpChatClient::new(chat_config)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let responder = GroundedResponder::new(chat, ResponderConfig::new(&cli.chat_model));

            let assistant = ChatAssistant::new(retrieval, responder);

            match assistant.respond(&chat_id, &message).await {
                Ok(answer) => {
                    if answer.has_context {
                        println!("[grounded in the attached document]");
                    }
                    println!("{}", answer.text);
                }
                Err(generation @ ChatError::Generation { .. }) => {
                    error!(%generation, "generation exhausted its retries");
                    println!("{GENERATION_APOLOGY}");
                }
                Err(other) => anyhow::bail!(other.to_string()),
            }
        }
        Command::Forget { chat_id } => {
            let pipeline = IngestionPipeline::new(
                LopdfExtractor,
                embedder,
                index,
                conversations,
                IngestionOptions::default(),
            );
            pipeline
                .detach(&chat_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("document removed from conversation {chat_id}");
        }
    }

    Ok(())
}
