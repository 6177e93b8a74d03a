//! # edgequake-doctag
//!
//! Summarise and tag PDF documents using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Scanned minutes, signed contracts and slide decks often carry no usable
//! text layer. Instead of extracting text, this crate rasterises the first
//! few pages into JPEGs and lets a VLM read them as a human would, asking
//! in one round trip for a short summary and up to three tags chosen from
//! an existing taxonomy.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic
//!  ├─ 2. Cleanup  delete {stem}_page*.jpg / {stem}_response.json from the last run
//!  ├─ 3. Render   rasterise ≤ max_pages at 2× via pdfium (spawn_blocking)
//!  ├─ 4. Encode   cap longest edge at 4096 px, JPEG q70 → q30 until ≤ 4.5 MiB
//!  ├─ 5. VLM      one multimodal request: prompt + page images
//!  └─ 6. Parse    {"summary", "tags"} — or the raw text if that fails
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doctag::{DocumentProcessor, ProcessingConfig, TagLibrary};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let processor = DocumentProcessor::from_config(ProcessingConfig::default())?;
//!     let tags = TagLibrary::load("tag_groups.json")?;
//!
//!     let result = processor
//!         .process_document("minutes.pdf", "data/converted_images", &tags)
//!         .await?;
//!     println!("{}\ntags: {}", result.summary, result.tags.join(", "));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doctag` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod prompts;
pub mod taxonomy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JpegPolicy, ProcessingConfig, ProcessingConfigBuilder};
pub use error::DocTagError;
pub use model::{
    resolve_client, ContentBlock, ConverseReply, ConverseRequest, ImageFormat, LlmProviderClient,
    Message, ModelClient, ReplyBlock, Role,
};
pub use output::{PageImage, ProcessingResult, ReplyOutcome, TokenUsage};
pub use pipeline::codec::{build_request, parse_reply, parse_reply_text, ParsedReply};
pub use pipeline::render::{rasterize, PdfiumRasterizer, Rasterizer};
pub use process::{process_many, DocumentProcessor};
pub use taxonomy::{TagGroup, TagLibrary, TagMatch};
