//! Heuristic page classification: ordered keyword/threshold rules.
//!
//! Work-order packages mix administrative forms, construction sketches,
//! circuit maps, and field photos in one scanned document. This module
//! resolves each page to exactly one category using cheap text signals,
//! deferring only genuinely ambiguous image pages to the vision fallback.
//!
//! ## Rule Order
//!
//! Rules run in a fixed priority order and the first match wins. Order
//! matters: forms routinely *reference* drawings and maps by name ("see
//! construction sketch", "circuit map: attached"), so the form rule must
//! fire before the drawing and map rules ever see the page. Each page gets
//! exactly one verdict; a page can never land in two categories.

use crate::output::{Category, PageSignal};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

/// Pages with less text than this are "near empty" for the watermark rule.
pub const NEAR_EMPTY_TEXT: usize = 50;

/// Sketch pages carry title blocks and dimension labels, not body text;
/// a drawing-phrase match on a longer page is a reference, not a drawing.
pub const DRAWING_TEXT_MAX: usize = 600;

/// Image pages below this text length are deferred to vision. Set high
/// because image-schematic pages such as circuit-map change sheets
/// legitimately carry several hundred to ~1500 characters of embedded
/// labels.
pub const SPARSE_TEXT_MAX: usize = 2000;

/// What the rule list concluded about one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A rule matched (or none did, which decides [`Category::Other`]).
    Decided(Category),
    /// Image page with sparse text; hand it to the vision fallback.
    NeedsVision,
}

// ── Rule 1: Form exclusion ───────────────────────────────────────────────
//
// Administrative paperwork: checklists, crew and material sheets, USA/dig
// ticket language, billing sheets, environmental and safety forms. These
// pages mention sketches and maps constantly without being one, so this
// rule runs first and is a plain substring match with no label exclusion.

const FORM_PHRASES: &[&str] = &[
    "pre-job checklist",
    "job checklist",
    "crew sheet",
    "crew time sheet",
    "material sheet",
    "material list",
    "usa ticket",
    "underground service alert",
    "dig ticket",
    "one call",
    "locate request",
    "progress billing",
    "billing sheet",
    "progress sheet",
    "environmental checklist",
    "environmental release",
    "job hazard",
    "tailboard",
];

fn is_form(text: &str) -> bool {
    FORM_PHRASES.iter().any(|phrase| text.contains(phrase))
}

// ── Rule 2: Drawing detection ────────────────────────────────────────────
//
// Construction-sketch phrasing counts only when it is not a form label
// (`construction sketch: ...`) and the page is light on text. "sketch no"
// deliberately also matches "sketch not to scale".

const DRAWING_PHRASES: &[&str] = &[
    "construction sketch",
    "construction drawing",
    "pole sheet",
    "plan view",
    "sketch no",
    "not to scale",
];

fn is_drawing(signal: &PageSignal) -> bool {
    signal.text_length < DRAWING_TEXT_MAX
        && DRAWING_PHRASES
            .iter()
            .any(|phrase| mentions_without_label(&signal.text, phrase))
}

// ── Rule 3: Map detection ────────────────────────────────────────────────
//
// Circuit-map change sheets announce themselves by title or by the CMCS
// acronym. A bare "circuit map" mention also counts unless it is the form
// label "circuit map:".

const CMCS_TITLE: &str = "circuit map change sheet";

static RE_CMCS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcmcs\b").unwrap());

fn is_map(text: &str) -> bool {
    text.contains(CMCS_TITLE)
        || RE_CMCS.is_match(text)
        || mentions_without_label(text, "circuit map")
}

// ── Rule 4: Photo detection ──────────────────────────────────────────────
//
// Photo-log vocabulary, or a near-empty page whose only content is a
// confidentiality watermark (scanned photos often carry nothing else in
// the text layer).

const PHOTO_PHRASES: &[&str] = &["photo", "picture", "field note"];

const WATERMARK_PHRASES: &[&str] = &["confidential", "internal use only"];

fn is_photo(signal: &PageSignal) -> bool {
    if PHOTO_PHRASES.iter().any(|phrase| signal.text.contains(phrase)) {
        return true;
    }
    signal.text_length < NEAR_EMPTY_TEXT
        && WATERMARK_PHRASES
            .iter()
            .any(|phrase| signal.text.contains(phrase))
}

// ── Label exclusion helper ───────────────────────────────────────────────

/// True if `text` contains `phrase` at least once where the occurrence is
/// not immediately followed by a colon.
///
/// "construction sketch: attached" is a form referencing a sketch;
/// "construction sketch\npole 4512" is the sketch itself. A page may carry
/// both a labelled and an unlabelled occurrence; one unlabelled mention is
/// enough.
pub(crate) fn mentions_without_label(text: &str, phrase: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = text[from..].find(phrase) {
        let end = from + pos + phrase.len();
        if text[end..].chars().next() != Some(':') {
            return true;
        }
        from = end;
    }
    false
}

// ── The ordered rule list ────────────────────────────────────────────────

/// Resolve one page to a verdict by running the rules in priority order.
///
/// Rules (first match wins):
/// 1. Form phrases → `Form`, even if drawing/map keywords are also present
/// 2. Unlabelled drawing phrase on a text-light page → `Drawing`
/// 3. CMCS terminology or unlabelled "circuit map" → `Map`
/// 4. Photo/picture/field-note vocabulary, or watermark-only page → `Photo`
/// 5. Embedded image with text under [`SPARSE_TEXT_MAX`] → defer to vision
///    (the near-zero-text case is subsumed by the same comparison)
/// 6. Embedded image on a text-heavy page → `Photo` (an image inside a
///    narrative page is most often an inserted photograph)
///
/// Pages matching nothing are `Other` and appear in no output list.
pub fn classify_page(signal: &PageSignal) -> Verdict {
    if is_form(&signal.text) {
        return Verdict::Decided(Category::Form);
    }
    if is_drawing(signal) {
        return Verdict::Decided(Category::Drawing);
    }
    if is_map(&signal.text) {
        return Verdict::Decided(Category::Map);
    }
    if is_photo(signal) {
        return Verdict::Decided(Category::Photo);
    }
    if signal.image_operator_count > 0 {
        if signal.text_length < SPARSE_TEXT_MAX {
            return Verdict::NeedsVision;
        }
        return Verdict::Decided(Category::Photo);
    }
    Verdict::Decided(Category::Other)
}

/// Outcome of the heuristic pass over a whole document.
#[derive(Debug, Clone)]
pub struct TriageOutcome {
    /// Final category per decided page (including `Other`), keyed by page
    /// number. Ambiguous pages are absent until the vision pass resolves
    /// them.
    pub verdicts: BTreeMap<usize, Category>,
    /// Signals deferred to vision, `needs_vision` set, in page order.
    pub ambiguous: Vec<PageSignal>,
    /// Number of signals examined.
    pub analyzed: usize,
}

/// Classify every scanned page.
///
/// Pure over its input: the deferred signals are flagged on owned clones,
/// never by mutating the caller's slice.
pub fn classify_pages(signals: &[PageSignal]) -> TriageOutcome {
    let mut verdicts = BTreeMap::new();
    let mut ambiguous = Vec::new();

    for signal in signals {
        match classify_page(signal) {
            Verdict::Decided(category) => {
                verdicts.insert(signal.page_number, category);
            }
            Verdict::NeedsVision => {
                let mut deferred = signal.clone();
                deferred.needs_vision = true;
                ambiguous.push(deferred);
            }
        }
    }

    TriageOutcome {
        verdicts,
        ambiguous,
        analyzed: signals.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(text: &str, images: usize) -> PageSignal {
        PageSignal::new(1, text, images)
    }

    fn category(text: &str, images: usize) -> Verdict {
        classify_page(&signal(text, images))
    }

    #[test]
    fn test_checklist_is_a_form_despite_map_words() {
        let verdict = category(
            "Pre-Job Checklist\n[ ] circuit map reviewed\n[ ] sketch attached",
            0,
        );
        assert_eq!(verdict, Verdict::Decided(Category::Form));
    }

    #[test]
    fn test_usa_ticket_is_a_form() {
        let verdict = category("Underground Service Alert\nUSA Ticket #8841203", 1);
        assert_eq!(verdict, Verdict::Decided(Category::Form));
    }

    #[test]
    fn test_cmcs_title_is_a_map() {
        let verdict = category("Circuit Map Change Sheet (CMCS)", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Map));
    }

    #[test]
    fn test_cmcs_acronym_alone_is_a_map() {
        let verdict = category("cmcs rev 2\ncircuit 1104", 1);
        assert_eq!(verdict, Verdict::Decided(Category::Map));
    }

    #[test]
    fn test_cmcs_must_be_a_whole_word() {
        // "cmcsx" is not the acronym; nothing else matches and there is no
        // image, so the page is Other.
        let verdict = category("cmcsx inventory code", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_labelled_circuit_map_is_not_a_map() {
        let verdict = category("attachments\ncircuit map: on file with ops", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_unlabelled_circuit_map_is_a_map() {
        let verdict = category("circuit map for feeder 1104, pole 12-4418", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Map));
    }

    #[test]
    fn test_construction_sketch_is_a_drawing() {
        let verdict = category("Construction Sketch\nPole 4512\nNot To Scale", 2);
        assert_eq!(verdict, Verdict::Decided(Category::Drawing));
    }

    #[test]
    fn test_labelled_sketch_reference_is_not_a_drawing() {
        let verdict = category("construction sketch: see attachment 2", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_text_heavy_sketch_mention_is_not_a_drawing() {
        let mut text = String::from("construction sketch revision notes\n");
        text.push_str(&"narrative ".repeat(80));
        assert!(text.chars().count() >= DRAWING_TEXT_MAX);
        let verdict = category(&text, 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_drawing_rule_beats_map_rule() {
        let verdict = category("construction sketch of circuit map area", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Drawing));
    }

    #[test]
    fn test_photo_log_is_a_photo() {
        let verdict = category("photo log, job site conditions", 3);
        assert_eq!(verdict, Verdict::Decided(Category::Photo));
    }

    #[test]
    fn test_field_notes_are_photos() {
        let verdict = category("field notes 6/14", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Photo));
    }

    #[test]
    fn test_watermark_only_page_is_a_photo() {
        let verdict = category("confidential", 1);
        assert_eq!(verdict, Verdict::Decided(Category::Photo));
    }

    #[test]
    fn test_watermark_on_full_page_is_not_the_photo_rule() {
        let mut text = String::from("internal use only\n");
        text.push_str(&"paragraph ".repeat(20));
        let verdict = category(&text, 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_sparse_image_page_defers_to_vision() {
        let verdict = category("wo 41783 rev a", 1);
        assert_eq!(verdict, Verdict::NeedsVision);
    }

    #[test]
    fn test_moderate_text_image_page_defers_to_vision() {
        let text = "x".repeat(1500);
        let verdict = category(&text, 2);
        assert_eq!(verdict, Verdict::NeedsVision);
    }

    #[test]
    fn test_dense_text_image_page_is_a_photo() {
        let text = "x".repeat(2500);
        let verdict = category(&text, 1);
        assert_eq!(verdict, Verdict::Decided(Category::Photo));
    }

    #[test]
    fn test_blank_page_is_other() {
        let verdict = category("", 0);
        assert_eq!(verdict, Verdict::Decided(Category::Other));
    }

    #[test]
    fn test_mentions_without_label() {
        assert!(mentions_without_label("a circuit map of the area", "circuit map"));
        assert!(!mentions_without_label("circuit map: attached", "circuit map"));
        assert!(!mentions_without_label("no mention here", "circuit map"));
        // One labelled and one unlabelled occurrence: counts.
        assert!(mentions_without_label(
            "circuit map: attached\nsee circuit map page",
            "circuit map"
        ));
        // Phrase at end of text.
        assert!(mentions_without_label("see the circuit map", "circuit map"));
    }

    #[test]
    fn test_classify_pages_groups_and_flags() {
        let signals = vec![
            PageSignal::new(1, "Job Checklist", 0),
            PageSignal::new(2, "Construction Sketch\nNot To Scale", 1),
            PageSignal::new(3, "Circuit Map Change Sheet (CMCS)", 1),
            PageSignal::new(4, "wo stamp", 2),
            PageSignal::new(5, "", 0),
        ];

        let outcome = classify_pages(&signals);
        assert_eq!(outcome.analyzed, 5);
        assert_eq!(outcome.verdicts.get(&1), Some(&Category::Form));
        assert_eq!(outcome.verdicts.get(&2), Some(&Category::Drawing));
        assert_eq!(outcome.verdicts.get(&3), Some(&Category::Map));
        assert_eq!(outcome.verdicts.get(&5), Some(&Category::Other));

        assert_eq!(outcome.ambiguous.len(), 1);
        assert_eq!(outcome.ambiguous[0].page_number, 4);
        assert!(outcome.ambiguous[0].needs_vision);
        assert!(!outcome.verdicts.contains_key(&4));

        // The caller's signals are untouched.
        assert!(!signals[3].needs_vision);
    }
}
