//! Document processing: the one operation the rest of a system calls.
//!
//! [`DocumentProcessor::process_document`] runs
//!
//! ```text
//! validate ─▶ cleanup ─▶ rasterise ─▶ request ─▶ model ─▶ parse
//! ```
//!
//! and returns the summary and tags. It persists nothing beyond its own
//! page images (and the optional cached reply); storing the result is the
//! caller's job.
//!
//! Re-running on the same source replaces the previous run's artifacts, so
//! a document that shrank from 5 pages to 2 leaves exactly two images.
//! Everything that goes wrong is fatal except an unparseable reply, which
//! degrades to a raw-text summary.

use crate::config::ProcessingConfig;
use crate::error::DocTagError;
use crate::model::{resolve_client, ModelClient};
use crate::output::ProcessingResult;
use crate::pipeline::artifacts::{cleanup_artifacts, response_cache_name};
use crate::pipeline::codec::{build_request_from_pages, parse_reply};
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::{input, llm};
use crate::taxonomy::TagLibrary;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the summarise-and-tag pipeline with an injected model client.
///
/// Holds no per-document state: one processor can serve many concurrent
/// calls, provided calls for the same source stem and output directory
/// are not run at the same time.
#[derive(Clone)]
pub struct DocumentProcessor {
    client: Arc<dyn ModelClient>,
    rasterizer: Arc<dyn Rasterizer>,
    config: ProcessingConfig,
}

impl fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("model", &self.client.model_id())
            .field("config", &self.config)
            .finish()
    }
}

impl DocumentProcessor {
    pub fn new(client: Arc<dyn ModelClient>, config: ProcessingConfig) -> Self {
        Self {
            client,
            rasterizer: Arc::new(PdfiumRasterizer),
            config,
        }
    }

    /// Replace the pdfium rasteriser.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Build a processor whose client is resolved from config and the
    /// environment (see [`resolve_client`]).
    pub fn from_config(config: ProcessingConfig) -> Result<Self, DocTagError> {
        let client = resolve_client(&config)?;
        Ok(Self::new(client, config))
    }

    pub fn client(&self) -> &Arc<dyn ModelClient> {
        &self.client
    }

    /// Summarise and tag `source`, using `config.max_pages`.
    ///
    /// # Errors
    /// Input, rasterisation, artifact-write and model errors are returned
    /// as-is. A reply that is not a `{summary, tags}` object is *not* an
    /// error; see [`crate::output::ReplyOutcome::Degraded`].
    pub async fn process_document(
        &self,
        source: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        library: &TagLibrary,
    ) -> Result<ProcessingResult, DocTagError> {
        self.process_document_with_pages(source, output_dir, library, self.config.max_pages)
            .await
    }

    /// As [`Self::process_document`] with an explicit page cap.
    pub async fn process_document_with_pages(
        &self,
        source: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        library: &TagLibrary,
        max_pages: usize,
    ) -> Result<ProcessingResult, DocTagError> {
        let start = Instant::now();
        let output_dir = output_dir.as_ref();
        if max_pages == 0 {
            return Err(DocTagError::InvalidConfig("max_pages must be ≥ 1".into()));
        }

        // ── Step 1: Validate input ───────────────────────────────────────
        let source = input::validate_source(source.as_ref())?;
        let stem = input::source_stem(&source)?;
        info!("Processing {}", source.display());

        // ── Step 2: Remove the previous run's artifacts ──────────────────
        let cleanup = cleanup_artifacts(output_dir, &stem).await;
        if !cleanup.removed.is_empty() {
            debug!("Removed {} stale artifacts for '{}'", cleanup.removed.len(), stem);
        }
        if !cleanup.failed.is_empty() {
            warn!(
                "{} stale artifacts for '{}' could not be removed",
                cleanup.failed.len(),
                stem
            );
        }

        // ── Step 3: Rasterise ────────────────────────────────────────────
        let pages = self
            .rasterizer
            .rasterize(&source, output_dir, max_pages, &self.config)
            .await?;
        info!("Rasterised {} pages", pages.len());

        // ── Step 4: Summarise + tag ──────────────────────────────────────
        let request =
            build_request_from_pages(&pages, library, self.config.prompt.as_deref()).await?;
        let reply = llm::invoke(&*self.client, &request, self.config.api_timeout_secs).await?;

        if self.config.cache_response {
            let path = output_dir.join(response_cache_name(&stem));
            let json = serde_json::to_string_pretty(&reply)
                .map_err(|e| DocTagError::Internal(format!("Failed to serialise reply: {e}")))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| DocTagError::ArtifactWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            debug!("Cached model reply at {}", path.display());
        }

        // ── Step 5: Parse ────────────────────────────────────────────────
        let parsed = parse_reply(&reply);
        let outcome = parsed.outcome();
        let (summary, tags) = parsed.into_parts();

        info!(
            "Processed {}: {:?} reply, {} tags, {}ms",
            source.display(),
            outcome,
            tags.len(),
            start.elapsed().as_millis()
        );

        Ok(ProcessingResult {
            summary,
            tags,
            outcome,
            pages,
            usage: reply.usage,
            stop_reason: reply.stop_reason,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Synchronous wrapper around [`Self::process_document`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from
    /// inside an async context.
    pub fn process_document_sync(
        &self,
        source: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        library: &TagLibrary,
    ) -> Result<ProcessingResult, DocTagError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| DocTagError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process_document(source, output_dir, library))
    }
}

/// Process many sources into one output directory.
///
/// Up to `concurrency` documents run at once, except that sources sharing
/// an artifact stem (e.g. `a/report.pdf` and `b/report.pdf`) run one after
/// another so their cleanup steps cannot delete each other's pages.
/// Results come back in input order.
pub async fn process_many(
    processor: &DocumentProcessor,
    sources: &[PathBuf],
    output_dir: &Path,
    library: &TagLibrary,
    concurrency: usize,
) -> Vec<(PathBuf, Result<ProcessingResult, DocTagError>)> {
    let groups = group_by_stem(sources);

    let mut results: Vec<(usize, PathBuf, Result<ProcessingResult, DocTagError>)> =
        stream::iter(groups.into_iter().map(|group| async move {
            let mut out = Vec::with_capacity(group.len());
            for (idx, path) in group {
                let result = processor.process_document(&path, output_dir, library).await;
                out.push((idx, path, result));
            }
            out
        }))
        .buffer_unordered(concurrency.max(1))
        .flat_map(stream::iter)
        .collect()
        .await;

    results.sort_by_key(|(idx, _, _)| *idx);
    results.into_iter().map(|(_, p, r)| (p, r)).collect()
}

/// Partition sources by artifact stem, keeping input indices and order.
fn group_by_stem(sources: &[PathBuf]) -> Vec<Vec<(usize, PathBuf)>> {
    let mut groups: Vec<(String, Vec<(usize, PathBuf)>)> = Vec::new();
    for (idx, path) in sources.iter().enumerate() {
        let key = input::source_stem(path).unwrap_or_else(|_| path.display().to_string());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push((idx, path.clone())),
            None => groups.push((key, vec![(idx, path.clone())])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}
