use crate::completion::{ChatCompletion, ChatMessage, CompletionRequest};
use crate::error::ChatError;
use crate::retry::BackoffPolicy;
use serde_json::Value;
use tracing::warn;

/// Retrieved context shorter than this is treated as noise and the
/// generic prompt is used instead.
pub const MIN_CONTEXT_CHARS: usize = 40;

pub const DEFAULT_RETRIES: u32 = 3;

/// What callers show the user when generation exhausts its retries. The
/// real failure is logged server-side; this is all the user sees.
pub const GENERATION_APOLOGY: &str =
    "Sorry, I couldn't generate a response just now. Please try again.";

#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub model: String,
    pub temperature: f32,
    pub retries: u32,
    pub backoff: BackoffPolicy,
    pub min_context_chars: usize,
}

impl ResponderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            retries: DEFAULT_RETRIES,
            backoff: BackoffPolicy::default(),
            min_context_chars: MIN_CONTEXT_CHARS,
        }
    }
}

/// Requested reply shape. `JsonField` asks the model for an object and
/// names the field holding the answer; anything that fails to parse that
/// way is still accepted as plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    PlainText,
    JsonField(String),
}

/// Outcome of the lenient reply parse. Malformed JSON is not an error,
/// it's just text.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Json(Value),
    Text(String),
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => ParsedReply::Json(value),
        Err(_) => ParsedReply::Text(raw.to_string()),
    }
}

fn extract_reply(raw: &str, shape: &OutputShape) -> String {
    match shape {
        OutputShape::PlainText => raw.to_string(),
        OutputShape::JsonField(field) => match parse_reply(raw) {
            ParsedReply::Json(value) => value
                .get(field)
                .and_then(Value::as_str)
                .map_or_else(|| raw.to_string(), str::to_string),
            ParsedReply::Text(text) => text,
        },
    }
}

#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub text: String,
    /// Whether the reply was conditioned on retrieved document context.
    pub has_context: bool,
}

fn build_system_prompt(context: &str, min_context_chars: usize) -> (String, bool) {
    let context = context.trim();
    if context.len() >= min_context_chars {
        let prompt = format!(
            "You are a helpful assistant answering questions about a document \
             the user uploaded.\n\n\
             Document excerpts:\n{context}\n\n\
             Instructions:\n\
             - Answer using only the excerpts above\n\
             - Cite the page number(s) your answer draws on\n\
             - If the question is not covered by the excerpts, say so plainly \
             instead of guessing\n"
        );
        (prompt, true)
    } else {
        (
            "You are a helpful assistant. Answer the user's question clearly \
             and concisely."
                .to_string(),
            false,
        )
    }
}

/// Produces one assistant reply, grounded in retrieved context when enough
/// of it exists, with bounded retries against the completion service.
pub struct GroundedResponder<C>
where
    C: ChatCompletion,
{
    chat: C,
    config: ResponderConfig,
}

impl<C> GroundedResponder<C>
where
    C: ChatCompletion,
{
    pub fn new(chat: C, config: ResponderConfig) -> Self {
        Self { chat, config }
    }

    pub async fn answer(
        &self,
        context: &str,
        user_message: &str,
        shape: &OutputShape,
    ) -> Result<GroundedAnswer, ChatError> {
        let (system_prompt, has_context) =
            build_system_prompt(context, self.config.min_context_chars);

        let request = CompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_message),
            ],
        };

        let attempts = self.config.retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.chat.complete(&request).await {
                Ok(raw) => {
                    return Ok(GroundedAnswer {
                        text: extract_reply(&raw, shape),
                        has_context,
                    });
                }
                Err(error) => {
                    warn!(attempt, attempts, %error, "chat completion attempt failed");
                    last_error = error.to_string();
                    if attempt < attempts {
                        let delay = self.config.backoff.delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(ChatError::Generation {
            attempts,
            last_error,
        })
    }
}
