//! Result types returned by the processing pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One rasterised page written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 1-indexed page number within the source document.
    pub page_num: usize,
    /// Where the JPEG was written (`{stem}_page{page_num}.jpg`).
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Size of the encoded JPEG on disk.
    pub byte_size: usize,
    /// JPEG quality the page was finally encoded at.
    pub quality: u8,
    /// True when the page is still above the byte cap at floor quality.
    pub oversized: bool,
}

/// How the model reply was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The reply was a well-formed `{summary, tags}` object.
    Structured,
    /// The reply text could not be parsed; it became the summary verbatim.
    Degraded,
    /// The reply carried no text block at all.
    Empty,
}

/// Token accounting reported by the model service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// The outcome of processing one document: a summary and its tags.
///
/// Tags are passed through exactly as the model returned them. Capping,
/// dedup and reconciliation against the taxonomy belong to the caller
/// (see [`crate::taxonomy::TagLibrary::reconcile`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub summary: String,
    pub tags: Vec<String>,
    pub outcome: ReplyOutcome,
    /// Pages sent to the model, in page order.
    pub pages: Vec<PageImage>,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
    /// Wall-clock time for cleanup, rasterisation and the model call.
    pub duration_ms: u64,
}
