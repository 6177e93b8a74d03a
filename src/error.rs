//! Error types for the edgequake-doctag library.
//!
//! Only *fatal* conditions live here. Processing a document either yields a
//! complete [`crate::output::ProcessingResult`] or one [`DocTagError`]; there
//! is no partial result.
//!
//! Three conditions are deliberately absent because they are recovered where
//! they occur:
//!
//! * a model reply that is not the expected `{summary, tags}` object degrades
//!   to a raw-text summary ([`crate::output::ReplyOutcome::Degraded`]);
//! * a stale artifact that cannot be deleted during cleanup is logged and
//!   skipped;
//! * a page that stays above the byte cap at floor JPEG quality is written
//!   anyway and flagged via [`crate::output::PageImage::oversized`]. If the
//!   model service then rejects the payload, that rejection surfaces as
//!   [`DocTagError::ModelCallFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doctag library.
#[derive(Debug, Error)]
pub enum DocTagError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The rendered bitmap could not be JPEG-encoded.
    #[error("JPEG encoding failed for page {page}: {detail}")]
    ImageEncodingFailed { page: usize, detail: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// Could not create the output directory or write an artifact into it.
    #[error("Failed to write artifact '{path}': {source}")]
    ArtifactWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, place it next to the binary, or\n\
set PDFIUM_LIB_PATH=/path/to/libpdfium to point at an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model service rejected or failed the request.
    ///
    /// Network failures, throttling, bad credentials and oversized payloads
    /// all land here unmodified. Retrying is the caller's decision.
    #[error("Model call failed: {message}")]
    ModelCallFailed { message: String },

    /// The model call exceeded `api_timeout_secs`.
    #[error("Model call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Taxonomy errors ───────────────────────────────────────────────────
    /// The tag-groups file could not be read or is not valid JSON.
    #[error("Failed to load tag taxonomy from '{path}': {detail}")]
    TaxonomyLoadFailed { path: PathBuf, detail: String },

    /// The tag-groups file parsed but violates the schema.
    #[error("Invalid tag taxonomy: {0}")]
    InvalidTaxonomy(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_pdf_display() {
        let e = DocTagError::NotAPdf {
            path: PathBuf::from("notes.txt"),
            magic: *b"hell",
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.txt"), "got: {msg}");
    }

    #[test]
    fn model_timeout_display() {
        let e = DocTagError::ModelTimeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn model_call_failed_keeps_message() {
        let e = DocTagError::ModelCallFailed {
            message: "ThrottlingException: rate exceeded".into(),
        };
        assert!(e.to_string().contains("ThrottlingException"));
    }

    #[test]
    fn artifact_write_failed_exposes_source() {
        use std::error::Error as _;
        let e = DocTagError::ArtifactWriteFailed {
            path: PathBuf::from("/ro/doc_page1.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("doc_page1.jpg"));
    }
}
