//! PDF rasterisation: render leading pages via pdfium and write them as
//! size-bounded JPEGs.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Rendering, resampling and JPEG encoding are all CPU-bound, so the whole
//! page loop runs on the blocking pool.
//!
//! ## Why scale, then cap?
//!
//! Pages are rendered at a fixed multiple of their natural size so small
//! print stays legible, then any result whose longest edge exceeds
//! `max_dimension` is resampled down. A poster-sized page therefore costs
//! one large render but never produces an image the model service rejects
//! for its dimensions.

use crate::config::{JpegPolicy, ProcessingConfig};
use crate::error::DocTagError;
use crate::output::PageImage;
use crate::pipeline::artifacts::page_image_name;
use crate::pipeline::encode::{downscale, encode_within_cap};
use crate::pipeline::input::source_stem;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bind to a pdfium shared library.
///
/// `PDFIUM_LIB_PATH` (a library file or the directory containing it) wins;
/// otherwise the current directory and then the system library paths are
/// searched.
pub fn bind_pdfium() -> Result<Pdfium, DocTagError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| DocTagError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Turns a validated source into page images written to `output_dir`.
///
/// [`PdfiumRasterizer`] is the production implementation; the processor
/// accepts any other through
/// [`crate::process::DocumentProcessor::with_rasterizer`].
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        source: &Path,
        output_dir: &Path,
        max_pages: usize,
        config: &ProcessingConfig,
    ) -> Result<Vec<PageImage>, DocTagError>;
}

/// [`Rasterizer`] backed by pdfium; see [`rasterize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        source: &Path,
        output_dir: &Path,
        max_pages: usize,
        config: &ProcessingConfig,
    ) -> Result<Vec<PageImage>, DocTagError> {
        rasterize(source, output_dir, max_pages, config).await
    }
}

/// Rasterise the first `max_pages` pages of `source` into `output_dir`.
///
/// Returns one [`PageImage`] per written page, ordered by page number and
/// named `{stem}_page{N}.jpg`. The output directory is created if absent.
/// Pages beyond `max_pages` are dropped with a warning.
pub async fn rasterize(
    source: &Path,
    output_dir: &Path,
    max_pages: usize,
    config: &ProcessingConfig,
) -> Result<Vec<PageImage>, DocTagError> {
    let job = RasterJob {
        source: source.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        stem: source_stem(source)?,
        max_pages,
        scale: config.render_scale,
        max_dimension: config.max_dimension,
        policy: config.jpeg_policy(),
        password: config.password.clone(),
    };

    tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| DocTagError::Internal(format!("Render task panicked: {}", e)))?
}

/// Everything the blocking render loop needs, owned.
struct RasterJob {
    source: PathBuf,
    output_dir: PathBuf,
    stem: String,
    max_pages: usize,
    scale: f32,
    max_dimension: u32,
    policy: JpegPolicy,
    password: Option<String>,
}

impl RasterJob {
    fn run(self) -> Result<Vec<PageImage>, DocTagError> {
        let pdfium = bind_pdfium()?;
        let document = self.open(&pdfium)?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let selected = total_pages.min(self.max_pages);
        info!("PDF loaded: {} pages", total_pages);
        if total_pages > self.max_pages {
            warn!(
                "{} has {} pages; only the first {} will be processed",
                self.source.display(),
                total_pages,
                self.max_pages
            );
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            DocTagError::ArtifactWriteFailed {
                path: self.output_dir.clone(),
                source: e,
            }
        })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.scale);
        let mut results = Vec::with_capacity(selected);

        for idx in 0..selected {
            let page_num = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| DocTagError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                DocTagError::RasterisationFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let image = downscale(image, self.max_dimension);
            let encoded = encode_within_cap(&image, &self.policy).map_err(|e| {
                DocTagError::ImageEncodingFailed {
                    page: page_num,
                    detail: e.to_string(),
                }
            })?;

            let path = self.output_dir.join(page_image_name(&self.stem, page_num));
            std::fs::write(&path, &encoded.bytes).map_err(|e| {
                DocTagError::ArtifactWriteFailed {
                    path: path.clone(),
                    source: e,
                }
            })?;

            info!(
                "Saved {} ({:.1} KB, quality {})",
                path.display(),
                encoded.bytes.len() as f64 / 1024.0,
                encoded.quality
            );

            results.push(PageImage {
                page_num,
                path,
                width: encoded.width,
                height: encoded.height,
                byte_size: encoded.bytes.len(),
                quality: encoded.quality,
                oversized: encoded.oversized,
            });
        }

        Ok(results)
    }

    fn open<'a>(&'a self, pdfium: &'a Pdfium) -> Result<PdfDocument<'a>, DocTagError> {
        let password = self.password.as_deref();
        pdfium
            .load_pdf_from_file(&self.source, password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    if password.is_some() {
                        DocTagError::WrongPassword {
                            path: self.source.clone(),
                        }
                    } else {
                        DocTagError::PasswordRequired {
                            path: self.source.clone(),
                        }
                    }
                } else {
                    DocTagError::CorruptPdf {
                        path: self.source.clone(),
                        detail: err_str,
                    }
                }
            })
    }
}
