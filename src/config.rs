//! Configuration types for document summarisation and tagging.
//!
//! All processing behaviour is controlled through [`ProcessingConfig`], built
//! via its [`ProcessingConfigBuilder`]. The model client itself is *not* part
//! of the config: it is constructed once and handed to
//! [`crate::process::DocumentProcessor`], so two processors can share one
//! client while using different rasterisation settings.

use crate::error::DocTagError;
use serde::{Deserialize, Serialize};

/// Hard cap on a single JPEG page: 4.5 MiB.
///
/// Multimodal endpoints reject images above ~5 MB; staying at 4.5 MiB leaves
/// room for request framing.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 4_718_592;

/// Configuration for processing one document.
///
/// # Example
/// ```rust
/// use edgequake_doctag::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .max_pages(3)
///     .jpeg_quality(80)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Maximum number of leading pages sent to the model. Default: 5.
    ///
    /// Pages beyond this are silently dropped (a warning is logged).
    pub max_pages: usize,

    /// Resolution multiplier applied when rasterising a page. Default: 2.0.
    ///
    /// PDF user space is 72 units per inch, so 2.0 renders at 144 DPI.
    pub render_scale: f32,

    /// Longest allowed edge of a page image in pixels. Default: 4096.
    pub max_dimension: u32,

    /// Initial JPEG quality. Default: 70.
    pub jpeg_quality: u8,

    /// Floor for quality negotiation. Default: 30.
    pub min_jpeg_quality: u8,

    /// Amount quality is lowered per attempt. Default: 10.
    pub quality_step: u8,

    /// Byte cap for one encoded page. Default: [`DEFAULT_MAX_IMAGE_BYTES`].
    pub max_image_bytes: usize,

    /// Instruction prompt override. If None, the built-in prompt is rendered
    /// with the current tag library.
    pub prompt: Option<String>,

    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    ///
    /// A five-sentence summary plus three tags is well under 300 tokens;
    /// the headroom absorbs models that think out loud before the JSON.
    pub max_tokens: usize,

    /// Timeout for the model round trip in seconds. Default: None (wait forever).
    pub api_timeout_secs: Option<u64>,

    /// Write the raw model reply to `{stem}_response.json`. Default: false.
    pub cache_response: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            render_scale: 2.0,
            max_dimension: 4096,
            jpeg_quality: 70,
            min_jpeg_quality: 30,
            quality_step: 10,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            prompt: None,
            model: None,
            provider_name: None,
            temperature: 0.1,
            max_tokens: 1024,
            api_timeout_secs: None,
            cache_response: false,
            password: None,
        }
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// The JPEG negotiation parameters carried by this config.
    pub fn jpeg_policy(&self) -> JpegPolicy {
        JpegPolicy {
            initial_quality: self.jpeg_quality,
            min_quality: self.min_jpeg_quality,
            step: self.quality_step,
            max_bytes: self.max_image_bytes,
        }
    }
}

/// Builder for [`ProcessingConfig`].
#[derive(Debug)]
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn min_jpeg_quality(mut self, q: u8) -> Self {
        self.config.min_jpeg_quality = q;
        self
    }

    pub fn quality_step(mut self, step: u8) -> Self {
        self.config.quality_step = step;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn cache_response(mut self, v: bool) -> Self {
        self.config.cache_response = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, DocTagError> {
        let c = &self.config;
        if c.max_pages == 0 {
            return Err(DocTagError::InvalidConfig(
                "max_pages must be ≥ 1".into(),
            ));
        }
        if !c.render_scale.is_finite() || c.render_scale <= 0.0 {
            return Err(DocTagError::InvalidConfig(format!(
                "render_scale must be positive, got {}",
                c.render_scale
            )));
        }
        if c.max_dimension == 0 {
            return Err(DocTagError::InvalidConfig(
                "max_dimension must be ≥ 1".into(),
            ));
        }
        for (name, q) in [
            ("jpeg_quality", c.jpeg_quality),
            ("min_jpeg_quality", c.min_jpeg_quality),
        ] {
            if !(1..=100).contains(&q) {
                return Err(DocTagError::InvalidConfig(format!(
                    "{name} must be 1–100, got {q}"
                )));
            }
        }
        if c.min_jpeg_quality > c.jpeg_quality {
            return Err(DocTagError::InvalidConfig(format!(
                "min_jpeg_quality ({}) exceeds jpeg_quality ({})",
                c.min_jpeg_quality, c.jpeg_quality
            )));
        }
        if c.quality_step == 0 {
            return Err(DocTagError::InvalidConfig(
                "quality_step must be ≥ 1".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(DocTagError::InvalidConfig(
                "max_image_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Quality negotiation parameters for JPEG encoding.
///
/// Encoding starts at `initial_quality` and drops by `step` while the
/// output is above `max_bytes`, never going below `min_quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegPolicy {
    pub initial_quality: u8,
    pub min_quality: u8,
    pub step: u8,
    pub max_bytes: usize,
}

impl Default for JpegPolicy {
    fn default() -> Self {
        ProcessingConfig::default().jpeg_policy()
    }
}
