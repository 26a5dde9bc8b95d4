//! Vision fallback: classify ambiguous pages with a multimodal model.
//!
//! This module turns a preview JPEG into one vision API call and a strict
//! single-word answer. All prompt wording lives in [`crate::prompts`] so it
//! can change without touching retry or parsing logic here.
//!
//! The fallback is best-effort by contract: no configured provider, a dead
//! endpoint, exhausted retries, or a chatty reply all resolve to `None`,
//! and the orchestrator defaults such pages to photos. Nothing in this
//! module can fail an extraction run.
//!
//! ## Retry Strategy
//!
//! Transient 5xx/timeout errors get exponential backoff
//! (`retry_backoff_ms * 2^attempt`): with the 500 ms default and 2 retries
//! the wait sequence is 500 ms → 1 s. An *unrecognised reply* is not
//! retried — the call succeeded, the model just failed the one-word
//! contract, and asking again rarely changes its mind at temperature 0.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::Category;
use crate::prompts::CLASSIFY_PAGE_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Env pair honoured when no provider is set in the config.
pub const VISION_PROVIDER_ENV: &str = "WORKPACK_VISION_PROVIDER";
pub const VISION_MODEL_ENV: &str = "WORKPACK_VISION_MODEL";

/// Model used when a provider is resolved without an explicit model name.
const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// One vision call: page preview in, free-text reply out.
///
/// The indirection exists so the classifier logic (retries, parsing,
/// fallback law) is testable against a stub without a network or an API
/// key.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Submit one page preview (base64 JPEG) and return the raw reply text.
    async fn classify_page(&self, image_base64: &str) -> Result<String, ExtractError>;
}

/// [`VisionModel`] backed by an edgequake-llm provider.
pub struct LlmVisionModel {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

#[async_trait]
impl VisionModel for LlmVisionModel {
    /// ## Message Layout
    ///
    /// 1. **System message** — the four-label classification prompt
    /// 2. **User message** — the preview JPEG as a base64 attachment with
    ///    empty text (vision APIs require a user turn; the image carries
    ///    all the content)
    ///
    /// `detail: "low"` forces a single overview tile: category calls need
    /// the page's gross layout, not its fine print, and low detail keeps
    /// per-page cost flat.
    async fn classify_page(&self, image_base64: &str) -> Result<String, ExtractError> {
        let messages = vec![
            ChatMessage::system(CLASSIFY_PAGE_PROMPT),
            ChatMessage::user_with_images(
                "",
                vec![ImageData::new(image_base64.to_string(), "image/jpeg").with_detail("low")],
            ),
        ];

        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        match timeout(Duration::from_secs(self.timeout_secs), call).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(ExtractError::VisionCall {
                detail: format!("{}", e),
            }),
            Err(_) => Err(ExtractError::VisionCall {
                detail: format!("timed out after {}s", self.timeout_secs),
            }),
        }
    }
}

/// Classifies ambiguous pages one at a time through an optional model.
///
/// Holding `Option<model>` rather than making the whole classifier optional
/// means callers never branch: a disabled classifier answers `None` for
/// every page, which the merge law turns into the photo default.
pub struct VisionClassifier {
    model: Option<Arc<dyn VisionModel>>,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl VisionClassifier {
    /// Build from config, resolving a provider if one is reachable.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let model = resolve_provider(config).map(|provider| {
            Arc::new(LlmVisionModel {
                provider,
                temperature: config.temperature,
                max_tokens: config.max_vision_tokens,
                timeout_secs: config.api_timeout_secs,
            }) as Arc<dyn VisionModel>
        });

        Self {
            model,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    /// A classifier that answers `None` without attempting any call.
    pub fn disabled() -> Self {
        Self {
            model: None,
            max_retries: 0,
            retry_backoff_ms: 0,
        }
    }

    /// Build around a specific model (stub or custom middleware).
    pub fn with_model(model: Arc<dyn VisionModel>, max_retries: u32, retry_backoff_ms: u64) -> Self {
        Self {
            model: Some(model),
            max_retries,
            retry_backoff_ms,
        }
    }

    /// Whether a model is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    /// Classify one page preview. `None` means "no usable answer" for any
    /// reason: disabled, transport failure after retries, or a reply that
    /// is not exactly one known label.
    pub async fn classify(&self, page_number: usize, image_base64: &str) -> Option<Category> {
        let model = match &self.model {
            Some(m) => m,
            None => {
                debug!("Page {}: vision fallback disabled, no model configured", page_number);
                return None;
            }
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Page {}: vision retry {}/{} after {}ms",
                    page_number, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match model.classify_page(image_base64).await {
                Ok(reply) => {
                    let label = parse_label(&reply);
                    match label {
                        Some(category) => debug!("Page {}: vision says {}", page_number, category),
                        None => warn!("Page {}: unrecognised vision reply {:?}", page_number, reply),
                    }
                    return label;
                }
                Err(e) => {
                    warn!("Page {}: vision attempt {} failed: {}", page_number, attempt + 1, e);
                }
            }
        }

        None
    }
}

/// Parse the model's reply into a category.
///
/// The whole reply, after stripping surrounding whitespace and punctuation,
/// must case-insensitively equal one label. "I think MAP" is not an answer.
pub fn parse_label(reply: &str) -> Option<Category> {
    let trimmed =
        reply.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation());
    match trimmed.to_ascii_uppercase().as_str() {
        "SKETCH" => Some(Category::Drawing),
        "MAP" => Some(Category::Map),
        "PHOTO" => Some(Category::Photo),
        "FORM" => Some(Category::Form),
        _ => None,
    }
}

/// The merge law for ambiguous pages: sketch and map answers keep their
/// list, any other answer (including no answer) lands in photos. Ambiguous
/// content is over-included as presumed photographic evidence rather than
/// dropped.
pub fn merged_category(vision: Option<Category>) -> Category {
    match vision {
        Some(Category::Drawing) => Category::Drawing,
        Some(Category::Map) => Category::Map,
        _ => Category::Photo,
    }
}

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is; the route for
///    custom middleware or tests.
/// 2. **Named provider + model** (`config.provider_name`) — instantiated
///    via [`ProviderFactory::create_llm_provider`], which reads the matching
///    API key from the environment.
/// 3. **Environment pair** (`WORKPACK_VISION_PROVIDER` +
///    `WORKPACK_VISION_MODEL`) — a deployment-level choice, honoured before
///    auto-detection so it wins even when several API keys are present.
/// 4. **OpenAI preference, then full auto-detection**
///    ([`ProviderFactory::from_env`]).
///
/// Every failure path returns `None` rather than an error: an extraction
/// run without vision still completes, it just defaults ambiguous pages to
/// photos.
pub(crate) fn resolve_provider(config: &ExtractionConfig) -> Option<Arc<dyn LLMProvider>> {
    if let Some(ref provider) = config.provider {
        return Some(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var(VISION_PROVIDER_ENV),
        std::env::var(VISION_MODEL_ENV),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
            return create_provider("openai", model);
        }
    }

    match ProviderFactory::from_env() {
        Ok((provider, _embedding)) => Some(provider),
        Err(e) => {
            debug!(
                "No vision provider configured; ambiguous pages will default to photos ({})",
                e
            );
            None
        }
    }
}

fn create_provider(name: &str, model: &str) -> Option<Arc<dyn LLMProvider>> {
    match ProviderFactory::create_llm_provider(name, model) {
        Ok(provider) => Some(provider),
        Err(e) => {
            warn!("Vision provider '{}' unavailable: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedReply(&'static str);

    #[async_trait]
    impl VisionModel for FixedReply {
        async fn classify_page(&self, _image_base64: &str) -> Result<String, ExtractError> {
            Ok(self.0.to_string())
        }
    }

    struct FlakyModel {
        failures_left: AtomicU32,
        reply: &'static str,
        calls: AtomicU32,
    }

    #[async_trait]
    impl VisionModel for FlakyModel {
        async fn classify_page(&self, _image_base64: &str) -> Result<String, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_left.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_left.store(remaining - 1, Ordering::SeqCst);
                return Err(ExtractError::VisionCall {
                    detail: "HTTP 503".into(),
                });
            }
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn test_parse_label_exact_words() {
        assert_eq!(parse_label("SKETCH"), Some(Category::Drawing));
        assert_eq!(parse_label("MAP"), Some(Category::Map));
        assert_eq!(parse_label("PHOTO"), Some(Category::Photo));
        assert_eq!(parse_label("FORM"), Some(Category::Form));
    }

    #[test]
    fn test_parse_label_tolerates_wrapping() {
        assert_eq!(parse_label("  map\n"), Some(Category::Map));
        assert_eq!(parse_label("PHOTO."), Some(Category::Photo));
        assert_eq!(parse_label("\"SKETCH\""), Some(Category::Drawing));
        assert_eq!(parse_label("**form**"), Some(Category::Form));
    }

    #[test]
    fn test_parse_label_rejects_sentences() {
        assert_eq!(parse_label("I think MAP"), None);
        assert_eq!(parse_label("PHOTO of a pole"), None);
        assert_eq!(parse_label(""), None);
        assert_eq!(parse_label("DIAGRAM"), None);
    }

    #[test]
    fn test_merge_law() {
        assert_eq!(merged_category(Some(Category::Drawing)), Category::Drawing);
        assert_eq!(merged_category(Some(Category::Map)), Category::Map);
        assert_eq!(merged_category(Some(Category::Photo)), Category::Photo);
        assert_eq!(merged_category(Some(Category::Form)), Category::Photo);
        assert_eq!(merged_category(None), Category::Photo);
    }

    #[tokio::test]
    async fn test_disabled_classifier_answers_none() {
        let classifier = VisionClassifier::disabled();
        assert!(!classifier.is_enabled());
        assert_eq!(classifier.classify(1, "aGVsbG8=").await, None);
    }

    #[tokio::test]
    async fn test_stub_reply_is_parsed() {
        let classifier = VisionClassifier::with_model(Arc::new(FixedReply("MAP")), 0, 1);
        assert_eq!(classifier.classify(3, "aGVsbG8=").await, Some(Category::Map));
    }

    #[tokio::test]
    async fn test_unrecognised_reply_is_none_without_retry() {
        let classifier = VisionClassifier::with_model(
            Arc::new(FixedReply("it appears to be a map")),
            3,
            1,
        );
        assert_eq!(classifier.classify(3, "aGVsbG8=").await, None);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let model = Arc::new(FlakyModel {
            failures_left: AtomicU32::new(2),
            reply: "MAP",
            calls: AtomicU32::new(0),
        });
        let classifier = VisionClassifier::with_model(Arc::clone(&model) as _, 2, 1);

        assert_eq!(classifier.classify(4, "aGVsbG8=").await, Some(Category::Map));
        assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_answer_none() {
        let model = Arc::new(FlakyModel {
            failures_left: AtomicU32::new(10),
            reply: "MAP",
            calls: AtomicU32::new(0),
        });
        let classifier = VisionClassifier::with_model(Arc::clone(&model) as _, 1, 1);

        assert_eq!(classifier.classify(4, "aGVsbG8=").await, None);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_classifier_is_deterministic_across_calls() {
        let classifier = VisionClassifier::with_model(Arc::new(FixedReply("photo")), 0, 1);
        let first = classifier.classify(7, "aGVsbG8=").await;
        let second = classifier.classify(7, "aGVsbG8=").await;
        assert_eq!(first, second);
        assert_eq!(first, Some(Category::Photo));
    }
}
