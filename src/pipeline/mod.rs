//! Pipeline stages for document summarisation and tagging.
//!
//! Each submodule implements exactly one step, so each can be tested
//! without the others (the codec without pdfium, the renderer without a
//! model).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ artifacts ──▶ render+encode ──▶ codec ──▶ llm ──▶ codec
//! (check)   (cleanup)     (pdfium, JPEG)   (request) (call)  (parse)
//! ```
//!
//! 1. [`input`]     — validate the source path and derive its artifact stem
//! 2. [`artifacts`] — deterministic names; delete the previous run's files
//! 3. [`render`]    — rasterise leading pages in `spawn_blocking`, writing
//!    each through [`encode`] (downscale + JPEG quality negotiation)
//! 4. [`codec`]     — build the multimodal request; parse the reply with
//!    raw-text fallback
//! 5. [`llm`]       — the only stage with network I/O

pub mod artifacts;
pub mod codec;
pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
