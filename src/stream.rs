//! Streaming triage API: emit page verdicts as they are decided.
//!
//! ## Why stream?
//!
//! The text heuristics settle most pages in microseconds, but every
//! ambiguous page costs a vision round-trip, and a package with a dozen
//! scanned pages can take the better part of a minute. A stream lets a
//! CLI or service surface verdicts as they land instead of going quiet
//! until the whole document is done.
//!
//! Unlike the eager [`crate::AssetExtractor::analyze_pages_by_content`],
//! which returns only after every page is settled, [`triage_stream`]
//! yields one [`PageVerdict`] per page, in page order. Heuristic verdicts
//! arrive immediately; an ambiguous page resolves when the stream reaches
//! it, so the vision calls stay sequential.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{Category, PageVerdict};
use crate::pipeline::classify::{self, TriageOutcome};
use crate::pipeline::vision::{self, VisionClassifier};
use crate::pipeline::{input, introspect, render};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of page verdicts.
pub type VerdictStream = Pin<Box<dyn Stream<Item = PageVerdict> + Send>>;

/// Classify a work-order package page by page, streaming verdicts in
/// page order.
///
/// Per-page trouble (an unanswerable model, a preview that fails to
/// render) degrades inside the item via the photo default, so the stream
/// itself is infallible. Document-level problems (file not found, not a
/// PDF, renderer not loaded) surface as the outer `Err`.
///
/// # Example
/// ```rust,no_run
/// use workpack_assets::{triage_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let mut stream = triage_stream("package.pdf", &config).await?;
/// while let Some(verdict) = stream.next().await {
///     println!("page {} -> {}", verdict.page_number, verdict.category);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn triage_stream(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<VerdictStream, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming triage: {}", input_str);

    // ── Resolve input and scan ───────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let pdf_path = resolved.path().to_path_buf();

    let scan = introspect::analyze(&pdf_path, config.password.as_deref()).await?;
    let outcome = classify::classify_pages(&scan.signals);

    // ── Render previews for the ambiguous pages up front ─────────────────
    // One document open for the whole batch; the vision calls themselves
    // are deferred into the stream.
    let vision = Arc::new(VisionClassifier::from_config(config));
    let previews: HashMap<usize, String> = if vision.is_enabled() && !outcome.ambiguous.is_empty()
    {
        let pages: Vec<usize> = outcome.ambiguous.iter().map(|s| s.page_number).collect();
        match render::render_previews(
            &pdf_path,
            config.password.as_deref(),
            &pages,
            config.preview_scale,
            config.preview_quality,
        )
        .await
        {
            Ok(list) => list.into_iter().collect(),
            Err(e) => {
                warn!("Preview rendering failed, ambiguous pages default to photos: {}", e);
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    // ── Build the stream ─────────────────────────────────────────────────
    let queue = build_queue(outcome, previews);
    let s = stream::iter(queue).then(move |item| {
        let vision = Arc::clone(&vision);
        async move {
            match item {
                Pending::Decided(page_number, category) => PageVerdict {
                    page_number,
                    category,
                    via_vision: false,
                },
                Pending::Ambiguous(page_number, preview) => {
                    let label = match preview {
                        Some(b64) => vision.classify(page_number, &b64).await,
                        None => None,
                    };
                    PageVerdict {
                        page_number,
                        category: vision::merged_category(label),
                        via_vision: true,
                    }
                }
            }
        }
    });

    Ok(Box::pin(s))
}

/// A page waiting to be emitted: either settled by the heuristics, or
/// ambiguous and carrying its base64 preview (when one rendered).
enum Pending {
    Decided(usize, Category),
    Ambiguous(usize, Option<String>),
}

impl Pending {
    fn page_number(&self) -> usize {
        match self {
            Pending::Decided(page, _) | Pending::Ambiguous(page, _) => *page,
        }
    }
}

/// Interleave decided and ambiguous pages back into page order.
fn build_queue(outcome: TriageOutcome, mut previews: HashMap<usize, String>) -> Vec<Pending> {
    let mut queue: Vec<Pending> = outcome
        .verdicts
        .iter()
        .map(|(&page, &category)| Pending::Decided(page, category))
        .collect();
    for signal in &outcome.ambiguous {
        let preview = previews.remove(&signal.page_number);
        queue.push(Pending::Ambiguous(signal.page_number, preview));
    }
    queue.sort_by_key(Pending::page_number);
    queue
}
