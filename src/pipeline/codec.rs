//! Request building and reply parsing for combined summarise-and-tag calls.
//!
//! Parsing is a single attempt with one explicit outcome per case:
//!
//! | Reply text                                  | Outcome                                  |
//! |---------------------------------------------|------------------------------------------|
//! | `{"summary": "...", "tags": [...]}`         | [`ParsedReply::Structured`]              |
//! | `{"summary": "...", "tags": "a, b"}`        | `Structured`, tags split on commas       |
//! | anything else                               | [`ParsedReply::Degraded`], text verbatim |
//! | no text block                               | [`ParsedReply::Empty`]                   |
//!
//! Tags are passed through as returned: no dedup, no cap.

use crate::error::DocTagError;
use crate::model::{ContentBlock, ConverseReply, ConverseRequest, ImageFormat, Message, Role};
use crate::output::{PageImage, ReplyOutcome};
use crate::prompts::resolve_prompt;
use crate::taxonomy::TagLibrary;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Build the single-turn request: prompt text, then one JPEG per page.
pub fn build_request(
    pages: &[Vec<u8>],
    library: &TagLibrary,
    prompt_override: Option<&str>,
) -> ConverseRequest {
    let mut content = Vec::with_capacity(pages.len() + 1);
    content.push(ContentBlock::Text(resolve_prompt(prompt_override, library)));
    content.extend(pages.iter().map(|bytes| ContentBlock::Image {
        format: ImageFormat::Jpeg,
        bytes: bytes.clone(),
    }));

    ConverseRequest {
        messages: vec![Message {
            role: Role::User,
            content,
        }],
    }
}

/// Read the written page images back and build the request from them.
pub async fn build_request_from_pages(
    pages: &[PageImage],
    library: &TagLibrary,
    prompt_override: Option<&str>,
) -> Result<ConverseRequest, DocTagError> {
    let mut loaded = Vec::with_capacity(pages.len());
    for page in pages {
        let bytes = tokio::fs::read(&page.path)
            .await
            .map_err(|e| DocTagError::Internal(format!(
                "Failed to read page image '{}': {}",
                page.path.display(),
                e
            )))?;
        loaded.push(bytes);
    }
    Ok(build_request(&loaded, library, prompt_override))
}

/// Interpretation of a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Structured { summary: String, tags: Vec<String> },
    /// Unparseable; the raw text becomes the summary.
    Degraded { raw_text: String },
    Empty,
}

impl ParsedReply {
    pub fn outcome(&self) -> ReplyOutcome {
        match self {
            ParsedReply::Structured { .. } => ReplyOutcome::Structured,
            ParsedReply::Degraded { .. } => ReplyOutcome::Degraded,
            ParsedReply::Empty => ReplyOutcome::Empty,
        }
    }

    /// `(summary, tags)`; degraded and empty replies carry no tags.
    pub fn into_parts(self) -> (String, Vec<String>) {
        match self {
            ParsedReply::Structured { summary, tags } => (summary, tags),
            ParsedReply::Degraded { raw_text } => (raw_text, Vec::new()),
            ParsedReply::Empty => (String::new(), Vec::new()),
        }
    }
}

/// Parse a full model reply, using its first text block.
pub fn parse_reply(reply: &ConverseReply) -> ParsedReply {
    match reply.first_text() {
        Some(text) => parse_reply_text(text),
        None => {
            warn!("Model reply contained no text block");
            ParsedReply::Empty
        }
    }
}

/// Parse reply text expected to hold `{"summary": ..., "tags": ...}`.
pub fn parse_reply_text(text: &str) -> ParsedReply {
    match parse_structured(strip_json_fences(text)) {
        Some((summary, tags)) => ParsedReply::Structured { summary, tags },
        None => {
            debug!("Reply is not a summary/tags object; using raw text as summary");
            ParsedReply::Degraded {
                raw_text: text.to_string(),
            }
        }
    }
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Remove a code fence wrapping the whole reply.
fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

fn parse_structured(text: &str) -> Option<(String, Vec<String>)> {
    let value: Value = serde_json::from_str(text).ok()?;
    let obj = value.as_object()?;
    let summary = obj.get("summary")?.as_str()?.to_string();
    let tags = match obj.get("tags")? {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()?,
        Value::String(s) => split_tag_string(s),
        _ => return None,
    };
    Some((summary, tags))
}

/// Split a delimited tag string on commas, trimming and dropping blanks.
pub fn split_tag_string(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
