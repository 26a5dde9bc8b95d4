//! Configuration types for asset extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across threads, serialise the interesting parts
//! for logging, and diff two runs to understand why their outputs differ.
//!
//! Callers set only what they care about and rely on the defaults for the
//! rest; the defaults match what the work-order ingestion service runs in
//! production.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Scale factors outside this range produce either unreadably small previews
/// or bitmaps large enough to exhaust memory on poster-size pages.
pub const MIN_RENDER_SCALE: f32 = 0.25;
pub const MAX_RENDER_SCALE: f32 = 4.0;

/// Configuration for a PDF asset-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use workpack_assets::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .asset_scale(2.0)
///     .max_photos(10)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Scale factor for the low-cost preview sent to the vision model.
    /// Range: 0.25–4.0. Default: 1.0.
    ///
    /// Previews only need to be legible enough for a category call, so 1.0
    /// keeps the base64 payload small and the per-call latency low.
    pub preview_scale: f32,

    /// JPEG quality for vision previews. Range: 10–100. Default: 70.
    pub preview_quality: u8,

    /// Scale factor for final asset renders. Range: 0.25–4.0. Default: 2.0.
    ///
    /// 2.0 doubles the page's native resolution, which keeps pole numbers and
    /// dimension text on construction sketches readable after JPEG
    /// compression. Raise it for small-print drawings; 4.0 on an ANSI-D sheet
    /// is the practical ceiling before bitmap allocation costs bite.
    pub asset_scale: f32,

    /// JPEG quality for final asset renders. Range: 10–100. Default: 85.
    pub asset_quality: u8,

    /// Most drawings to render per document. Default: 5.
    ///
    /// Work-order packages repeat the same sketch across revisions; the first
    /// few pages in page order carry the current one. The caps bound both
    /// rendering time and blob-storage cost per job.
    pub max_drawings: usize,

    /// Most maps to render per document. Default: 3.
    pub max_maps: usize,

    /// Most photos to render per document. Default: 15.
    pub max_photos: usize,

    /// Vision model identifier, e.g. "gpt-4o-mini".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Vision provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, provider resolution falls back to the
    /// environment; if nothing is configured there either, the vision
    /// fallback is disabled and ambiguous pages default to photos.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for vision classification. Default: 0.0.
    ///
    /// The model is asked for a single category word; any nonzero
    /// temperature only adds ways to get that word wrong.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate per page. Default: 16.
    ///
    /// The expected reply is one word. A small ceiling keeps a chatty model
    /// from running up cost, and replies that need more than this were never
    /// going to parse anyway.
    pub max_vision_tokens: usize,

    /// Maximum retry attempts on a transient vision API failure. Default: 2.
    ///
    /// Transient 5xx and timeout errors get retried; after the last attempt
    /// the page falls back to the photo default rather than failing the run.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    ///
    /// Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-vision-call timeout in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress observer invoked at each pipeline milestone.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            preview_scale: 1.0,
            preview_quality: 70,
            asset_scale: 2.0,
            asset_quality: 85,
            max_drawings: 5,
            max_maps: 3,
            max_photos: 15,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_vision_tokens: 16,
            max_retries: 2,
            retry_backoff_ms: 500,
            password: None,
            api_timeout_secs: 30,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("preview_scale", &self.preview_scale)
            .field("preview_quality", &self.preview_quality)
            .field("asset_scale", &self.asset_scale)
            .field("asset_quality", &self.asset_quality)
            .field("max_drawings", &self.max_drawings)
            .field("max_maps", &self.max_maps)
            .field("max_photos", &self.max_photos)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_vision_tokens", &self.max_vision_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn preview_scale(mut self, scale: f32) -> Self {
        self.config.preview_scale = scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE);
        self
    }

    pub fn preview_quality(mut self, quality: u8) -> Self {
        self.config.preview_quality = quality.clamp(10, 100);
        self
    }

    pub fn asset_scale(mut self, scale: f32) -> Self {
        self.config.asset_scale = scale.clamp(MIN_RENDER_SCALE, MAX_RENDER_SCALE);
        self
    }

    pub fn asset_quality(mut self, quality: u8) -> Self {
        self.config.asset_quality = quality.clamp(10, 100);
        self
    }

    pub fn max_drawings(mut self, n: usize) -> Self {
        self.config.max_drawings = n;
        self
    }

    pub fn max_maps(mut self, n: usize) -> Self {
        self.config.max_maps = n;
        self
    }

    pub fn max_photos(mut self, n: usize) -> Self {
        self.config.max_photos = n;
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

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_vision_tokens(mut self, n: usize) -> Self {
        self.config.max_vision_tokens = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The setters clamp, so a config assembled through the builder always
    /// passes; validation catches configs mutated through the public fields.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        for (label, scale) in [("preview_scale", c.preview_scale), ("asset_scale", c.asset_scale)]
        {
            if !scale.is_finite() || !(MIN_RENDER_SCALE..=MAX_RENDER_SCALE).contains(&scale) {
                return Err(ExtractError::InvalidConfig(format!(
                    "{label} must be {MIN_RENDER_SCALE}–{MAX_RENDER_SCALE}, got {scale}"
                )));
            }
        }
        for (label, quality) in [
            ("preview_quality", c.preview_quality),
            ("asset_quality", c.asset_quality),
        ] {
            if !(10..=100).contains(&quality) {
                return Err(ExtractError::InvalidConfig(format!(
                    "{label} must be 10–100, got {quality}"
                )));
            }
        }
        if c.max_vision_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_vision_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
