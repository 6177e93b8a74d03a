//! The model-service seam: request/reply shapes and client implementations.
//!
//! The pipeline depends on exactly two shapes:
//!
//! * a single user turn whose content is one text block followed by image
//!   blocks ([`ConverseRequest`]), and
//! * a reply carrying content blocks plus usage metadata ([`ConverseReply`]),
//!   from which the first text block is taken.
//!
//! [`ModelClient`] is the injection point. Build one client at startup
//! (usually [`LlmProviderClient`] via [`resolve_client`]) and pass it to
//! [`crate::process::DocumentProcessor`]; tests substitute a fake.

use crate::config::ProcessingConfig;
use crate::error::DocTagError;
use crate::output::TokenUsage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Model used when a provider is named but no model is given.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

// ── Request ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Encoded image formats accepted in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// One block of request content.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    /// Raw encoded bytes (not base64).
    Image { format: ImageFormat, bytes: Vec<u8> },
}

impl fmt::Debug for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBlock::Text(t) => f.debug_tuple("Text").field(t).finish(),
            ContentBlock::Image { format, bytes } => f
                .debug_struct("Image")
                .field("format", format)
                .field("bytes", &format_args!("<{} bytes>", bytes.len()))
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// A multimodal request: one conversational turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverseRequest {
    pub messages: Vec<Message>,
}

impl ConverseRequest {
    /// Total bytes of image payload across all blocks.
    pub fn image_bytes(&self) -> usize {
        self.messages
            .iter()
            .flat_map(|m| &m.content)
            .map(|b| match b {
                ContentBlock::Image { bytes, .. } => bytes.len(),
                ContentBlock::Text(_) => 0,
            })
            .sum()
    }
}

// ── Reply ────────────────────────────────────────────────────────────────

/// One block of reply content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyBlock {
    Text { text: String },
    /// Non-text content (tool use, reasoning, …) the pipeline ignores.
    Other { kind: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverseReply {
    pub role: Role,
    pub content: Vec<ReplyBlock>,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
}

impl ConverseReply {
    /// A reply with a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ReplyBlock::Text { text: text.into() }],
            usage: TokenUsage::default(),
            stop_reason: Some("end_turn".to_string()),
        }
    }

    /// The first text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|b| match b {
            ReplyBlock::Text { text } => Some(text.as_str()),
            ReplyBlock::Other { .. } => None,
        })
    }
}

// ── Client seam ──────────────────────────────────────────────────────────

/// A vision-capable model service.
///
/// Implementations must not retry internally; failures propagate to the
/// caller unchanged.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseReply, DocTagError>;

    /// Identifier of the model requests are sent to.
    fn model_id(&self) -> &str;
}

/// [`ModelClient`] backed by any edgequake-llm [`LLMProvider`].
pub struct LlmProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    options: CompletionOptions,
}

impl fmt::Debug for LlmProviderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmProviderClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("model", &self.model)
            .finish()
    }
}

impl LlmProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            options: CompletionOptions::default(),
        }
    }

    /// Apply temperature and output-token limits from the config.
    pub fn with_config(mut self, config: &ProcessingConfig) -> Self {
        self.options = build_options(config);
        self
    }
}

#[async_trait]
impl ModelClient for LlmProviderClient {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseReply, DocTagError> {
        let messages = to_chat_messages(request);
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| DocTagError::ModelCallFailed {
                message: e.to_string(),
            })?;

        let content = if response.content.is_empty() {
            Vec::new()
        } else {
            vec![ReplyBlock::Text {
                text: response.content,
            }]
        };

        Ok(ConverseReply {
            role: Role::Assistant,
            content,
            usage: TokenUsage::new(
                response.prompt_tokens as u64,
                response.completion_tokens as u64,
            ),
            stop_reason: response.finish_reason,
        })
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Flatten each request turn into one edgequake-llm chat message.
///
/// Text blocks are joined with blank lines; image blocks become base64
/// attachments in their original order.
fn to_chat_messages(request: &ConverseRequest) -> Vec<ChatMessage> {
    request
        .messages
        .iter()
        .map(|m| {
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for block in &m.content {
                match block {
                    ContentBlock::Text(t) => texts.push(t.as_str()),
                    ContentBlock::Image { format, bytes } => {
                        images.push(
                            ImageData::new(STANDARD.encode(bytes), format.mime_type())
                                .with_detail("high"),
                        );
                    }
                }
            }
            let text = texts.join("\n\n");
            debug!("Chat message: {} chars text, {} images", text.len(), images.len());
            match m.role {
                Role::User => ChatMessage::user_with_images(text.as_str(), images),
                Role::Assistant => ChatMessage::assistant(text.as_str()),
            }
        })
        .collect()
}

fn build_options(config: &ProcessingConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocTagError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocTagError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Build the production [`ModelClient`] from config and environment.
///
/// Resolution order:
///
/// 1. `config.provider_name` (+ `config.model`, default [`DEFAULT_MODEL`])
/// 2. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 3. `openai` when `OPENAI_API_KEY` is set
/// 4. `ProviderFactory::from_env()` auto-detection
///
/// Call this once at startup and share the result.
pub fn resolve_client(config: &ProcessingConfig) -> Result<Arc<dyn ModelClient>, DocTagError> {
    let (provider, model) = resolve_provider(config)?;
    Ok(Arc::new(LlmProviderClient::new(provider, model).with_config(config)))
}

fn resolve_provider(
    config: &ProcessingConfig,
) -> Result<(Arc<dyn LLMProvider>, String), DocTagError> {
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return Ok((create_vision_provider(name, model)?, model.to_string()));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return Ok((create_vision_provider(&prov, &model)?, model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return Ok((create_vision_provider("openai", model)?, model.to_string()));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocTagError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(with_own_model(llm_provider))
}

/// Auto-detected providers run their own default model.
fn with_own_model(provider: Arc<dyn LLMProvider>) -> (Arc<dyn LLMProvider>, String) {
    let model = provider.model().to_string();
    (provider, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::MockProvider;

    #[test]
    fn first_text_skips_non_text_blocks() {
        let reply = ConverseReply {
            role: Role::Assistant,
            content: vec![
                ReplyBlock::Other {
                    kind: "reasoning".into(),
                },
                ReplyBlock::Text {
                    text: "hello".into(),
                },
                ReplyBlock::Text {
                    text: "second".into(),
                },
            ],
            usage: TokenUsage::default(),
            stop_reason: None,
        };
        assert_eq!(reply.first_text(), Some("hello"));
    }

    #[test]
    fn first_text_none_when_no_text() {
        let reply = ConverseReply {
            role: Role::Assistant,
            content: vec![],
            usage: TokenUsage::default(),
            stop_reason: None,
        };
        assert_eq!(reply.first_text(), None);
    }

    #[test]
    fn image_block_debug_hides_bytes() {
        let block = ContentBlock::Image {
            format: ImageFormat::Jpeg,
            bytes: vec![0xFF; 2048],
        };
        let dbg = format!("{block:?}");
        assert!(dbg.contains("<2048 bytes>"));
        assert!(dbg.len() < 100);
    }

    #[test]
    fn request_counts_image_bytes() {
        let req = ConverseRequest {
            messages: vec![Message {
                role: Role::User,
                content: vec![
                    ContentBlock::Text("x".into()),
                    ContentBlock::Image {
                        format: ImageFormat::Jpeg,
                        bytes: vec![1; 10],
                    },
                    ContentBlock::Image {
                        format: ImageFormat::Jpeg,
                        bytes: vec![1; 5],
                    },
                ],
            }],
        };
        assert_eq!(req.image_bytes(), 15);
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ProcessingConfig::default());
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn jpeg_format_tags() {
        assert_eq!(ImageFormat::Jpeg.mime_type(), "image/jpeg");
    }

    fn page_request() -> ConverseRequest {
        ConverseRequest {
            messages: vec![Message {
                role: Role::User,
                content: vec![
                    ContentBlock::Text("Summarise.".into()),
                    ContentBlock::Image {
                        format: ImageFormat::Jpeg,
                        bytes: vec![0xFF, 0xD8, 0xFF],
                    },
                ],
            }],
        }
    }

    #[test]
    fn page_images_are_sent_at_high_detail() {
        let messages = to_chat_messages(&page_request());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Summarise.");
        let images = messages[0].images.as_ref().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/jpeg");
        assert_eq!(images[0].data, STANDARD.encode([0xFF, 0xD8, 0xFF]));
        assert_eq!(images[0].detail.as_deref(), Some("high"));
    }

    #[test]
    fn auto_detected_provider_reports_its_own_model() {
        let (_, model) = with_own_model(Arc::new(MockProvider::new()));
        assert_eq!(model, "mock-model");
    }

    #[tokio::test]
    async fn provider_client_returns_reply_text() {
        let mock = MockProvider::new();
        mock.add_response(r#"{"summary":"S","tags":["A"]}"#).await;
        let client = LlmProviderClient::new(Arc::new(mock), "mock-model")
            .with_config(&ProcessingConfig::default());

        let reply = client.converse(&page_request()).await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.first_text(), Some(r#"{"summary":"S","tags":["A"]}"#));
        assert_eq!(client.model_id(), "mock-model");
    }
}
