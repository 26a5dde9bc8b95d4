//! # workpack-assets
//!
//! Classify and extract page assets — photos, construction drawings,
//! circuit maps — from utility work-order PDF packages.
//!
//! ## Why this crate?
//!
//! Field crews scan everything into one PDF: permits, pre-job checklists,
//! construction sketches, circuit map change sheets, photo pages. Downstream
//! tooling wants the visual assets filed individually, but filename and
//! bookmark conventions do not survive scanning and merging, so nothing
//! about the container says which page is which. This crate classifies pages
//! by *content*: a cheap text-layer pass settles most pages, and a vision
//! model is consulted only for the pages the text cannot settle.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF package
//!  │
//!  ├─ 1. Input       resolve local file or download from URL
//!  ├─ 2. Introspect  text layer + image-object counts via pdfium
//!  ├─ 3. Classify    six ordered keyword rules, first match wins
//!  ├─ 4. Vision      one-word fallback for ambiguous pages (optional)
//!  └─ 5. Render      capped categories to JPEG under job_{id}/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use workpack_assets::{AssetExtractor, ExtractionConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let extractor = AssetExtractor::new(ExtractionConfig::default());
//!     // Never fails: missing renderer or unreadable input folds into
//!     // the summary string.
//!     let output = extractor
//!         .extract_all_assets("package.pdf", "41783", Path::new("./assets"))
//!         .await;
//!     println!("{}", output.summary);
//!     for photo in &output.photos {
//!         println!("  {} (page {})", photo.name, photo.page_number);
//!     }
//! }
//! ```
//!
//! ## The Vision Fallback
//!
//! Pages with embedded images but little text (a scanned sketch and a field
//! photo look identical to the text layer) are put to a vision model as a
//! one-word question: `SKETCH`, `MAP`, `PHOTO`, or `FORM`. The provider is
//! auto-detected from `OPENAI_API_KEY` (or `WORKPACK_VISION_PROVIDER` +
//! `WORKPACK_VISION_MODEL` for another backend); with no credential at all
//! the fallback quietly defaults those pages to photos, which errs toward
//! extracting too much rather than losing a drawing.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `workpack` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! workpack-assets = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capability;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capability::Capabilities;
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::ExtractError;
pub use extract::AssetExtractor;
pub use output::{
    AssetRecord, Category, ClassificationResult, DocumentInfo, ExtractionOutput, ExtractionStats,
    PageSignal, PageVerdict,
};
pub use pipeline::vision::{VisionClassifier, VisionModel};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{triage_stream, VerdictStream};
