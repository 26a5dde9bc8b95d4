//! Output and data-model types shared across the pipeline.
//!
//! Everything here is plain data: built fresh per extraction call, never
//! persisted by this crate, serialisable for the host platform's job
//! records and the CLI `--json` surface. The one deliberate structural
//! choice is that per-page categories are carried as a single
//! `page → Category` mapping rather than parallel per-category arrays, so
//! a page can never appear in two categories — exclusivity is guaranteed
//! by construction instead of by a cleanup pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ── Categories ───────────────────────────────────────────────────────────

/// The per-page triage outcome. Mutually exclusive by design.
///
/// `Other` is the quiet majority: narrative form pages, continuation text,
/// boilerplate. Pages resolved to `Other` appear in no output list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Construction sketch, pole sheet, plan view.
    Drawing,
    /// Circuit or location map.
    Map,
    /// Site photograph or photo log page.
    Photo,
    /// Administrative form (checklist, crew/material sheet, billing sheet).
    Form,
    /// Nothing recognisable; excluded from all output lists.
    Other,
}

impl Category {
    /// Lower-case noun used for directory names, file prefixes, and the
    /// `AssetRecord::kind` field.
    pub fn noun(&self) -> &'static str {
        match self {
            Category::Drawing => "drawing",
            Category::Map => "map",
            Category::Photo => "photo",
            Category::Form => "form",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

// ── Page signals ─────────────────────────────────────────────────────────

/// What the introspector observed on one page.
///
/// `text` is the page's text layer, concatenated and lower-cased once here
/// so every downstream keyword rule can match without re-folding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSignal {
    /// 1-based page number.
    pub page_number: usize,
    /// Lower-cased text-layer content.
    pub text: String,
    /// Character count of `text` (cached; the rules compare it constantly).
    pub text_length: usize,
    /// Number of embedded raster-image objects on the page (not vector paths).
    pub image_operator_count: usize,
    /// Set by the classifier when the page is deferred to the vision fallback.
    pub needs_vision: bool,
}

impl PageSignal {
    /// Build a signal from raw extracted text, folding case and caching length.
    pub fn new(page_number: usize, raw_text: &str, image_operator_count: usize) -> Self {
        let text = raw_text.to_lowercase();
        let text_length = text.chars().count();
        Self {
            page_number,
            text,
            text_length,
            image_operator_count,
            needs_vision: false,
        }
    }
}

// ── Classification result ────────────────────────────────────────────────

/// Page numbers per category: deduplicated, ascending, mutually exclusive.
///
/// This is the pre-cap, pre-render view — if analysis finds twenty drawing
/// candidates, all twenty are reported here even though at most five will
/// be rendered by `extract_all_assets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub drawings: Vec<usize>,
    pub maps: Vec<usize>,
    pub photos: Vec<usize>,
    pub forms: Vec<usize>,
    /// Page count of the scanned document (not the sum of the lists).
    pub total_pages: usize,
}

impl ClassificationResult {
    /// Group a page→category mapping into per-category lists.
    ///
    /// `BTreeMap` iteration order is ascending by page number, and a map key
    /// is unique, so the lists come out sorted, deduplicated, and disjoint
    /// without any post-processing.
    pub fn from_verdicts(verdicts: &BTreeMap<usize, Category>, total_pages: usize) -> Self {
        let mut result = Self {
            total_pages,
            ..Self::default()
        };
        for (&page, category) in verdicts {
            match category {
                Category::Drawing => result.drawings.push(page),
                Category::Map => result.maps.push(page),
                Category::Photo => result.photos.push(page),
                Category::Form => result.forms.push(page),
                Category::Other => {}
            }
        }
        result
    }

    /// Whether any renderable asset (photo, drawing, map) was found.
    ///
    /// Forms are deliberately excluded: they are detected only to keep them
    /// *out* of the other categories, and are never materialised.
    pub fn has_assets(&self) -> bool {
        !self.drawings.is_empty() || !self.maps.is_empty() || !self.photos.is_empty()
    }
}

/// One page's final category, as yielded by [`crate::triage_stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageVerdict {
    /// 1-based page number.
    pub page_number: usize,
    pub category: Category,
    /// True when the text heuristics could not decide and the page went
    /// through the vision fallback (including its default when no model
    /// is configured).
    pub via_vision: bool,
}

// ── Asset records ────────────────────────────────────────────────────────

/// One successfully rendered page image.
///
/// Ownership of the file at `path` passes to the caller, which uploads it
/// to blob storage and removes the local copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// File name (also the display name downstream), e.g. `photo_page_3.jpg`.
    pub name: String,
    /// Full path of the written JPEG.
    pub path: PathBuf,
    /// 1-based source page number.
    pub page_number: usize,
    /// Category noun ("photo", "drawing", "map") or the caller's prefix.
    #[serde(rename = "type")]
    pub kind: String,
}

// ── Extraction output ────────────────────────────────────────────────────

/// Everything `extract_all_assets` produces.
///
/// Never an `Err`: capability gaps, unreadable documents, and per-page
/// failures all fold into `summary`, and the record lists are simply as
/// long as what actually got rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub photos: Vec<AssetRecord>,
    pub drawings: Vec<AssetRecord>,
    pub maps: Vec<AssetRecord>,
    /// Human-readable account of what happened, suitable for a job record.
    pub summary: String,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// The degraded result used when the native renderer never loaded.
    pub fn unavailable() -> Self {
        Self {
            summary: UNAVAILABLE_SUMMARY.to_string(),
            ..Self::default()
        }
    }

    /// The degraded result for a document that could not be opened or read.
    pub fn failed(detail: &str) -> Self {
        Self {
            summary: format!("PDF asset extraction failed: {detail}"),
            ..Self::default()
        }
    }
}

/// Summary used when rendering is unavailable in this environment.
pub const UNAVAILABLE_SUMMARY: &str =
    "PDF asset extraction unavailable: the native PDF renderer is not loaded in this environment";

/// Counters for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Page count of the source document.
    pub total_pages: usize,
    /// Pages that produced a usable signal (corrupt pages are omitted).
    pub analyzed_pages: usize,
    /// Pages deferred to the vision fallback.
    pub ambiguous_pages: usize,
    /// Ambiguous pages the vision model answered with a recognised label.
    pub vision_resolved: usize,
    /// JPEG files written.
    pub assets_rendered: usize,
    /// Wall-clock time for the whole run.
    pub duration_ms: u64,
}

/// Compose the success summary for a completed run.
pub(crate) fn summary_line(
    photos: usize,
    drawings: usize,
    maps: usize,
    form_pages: usize,
    total_pages: usize,
) -> String {
    let mut s = format!(
        "Extracted {photos} photo(s), {drawings} drawing(s), {maps} map(s) from {total_pages} page(s)"
    );
    if form_pages > 0 {
        s.push_str(&format!("; {form_pages} form page(s) skipped"));
    }
    s
}

// ── Document info ────────────────────────────────────────────────────────

/// Lightweight document metadata, read without rendering or classifying.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
