//! Progress-callback trait for extraction pipeline events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline scans, classifies, and renders pages.
//!
//! Callers can forward events to a Tokio broadcast channel, a job-status
//! record, or a terminal progress bar without the library knowing anything
//! about how the host application communicates. The trait is `Send + Sync`
//! because the scan and render stages run on blocking worker threads.
//!
//! # Example
//!
//! ```rust
//! use workpack_assets::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_asset_rendered(&self, page_num: usize, kind: &str, name: &str) {
//!         let done = self.rendered.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("[{done}] page {page_num} -> {kind} {name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     rendered: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{Category, ExtractionStats};
use std::sync::Arc;

/// Called by the extraction pipeline as it works through a document.
///
/// Implementations must be `Send + Sync` (scan and render callbacks fire from
/// a blocking worker thread, vision callbacks from the async runtime). All
/// methods have default no-op implementations so callers only override what
/// they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page is read.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages in the document
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called once per page with its final category, after the heuristic
    /// pass and, for ambiguous pages, after the vision fallback.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    /// * `category`    — the resolved category ([`Category::Other`] for
    ///   pages that will not be rendered)
    fn on_page_classified(&self, page_num: usize, total_pages: usize, category: Category) {
        let _ = (page_num, total_pages, category);
    }

    /// Called just before a vision request is sent for an ambiguous page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_vision_fallback(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page image has been written to disk.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed source page number
    /// * `kind`     — category noun ("photo", "drawing", "map")
    /// * `name`     — file name of the written JPEG
    fn on_asset_rendered(&self, page_num: usize, kind: &str, name: &str) {
        let _ = (page_num, kind, name);
    }

    /// Called when a single page fails to render; the batch continues.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `error`    — human-readable error description
    fn on_render_error(&self, page_num: usize, error: &str) {
        let _ = (page_num, error);
    }

    /// Called once after the run finishes, whatever the outcome.
    fn on_extraction_complete(&self, stats: &ExtractionStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
