//! Prompts for vision-based page classification.
//!
//! Centralising the prompt here keeps it inspectable by unit tests without
//! spinning up a real vision model, and means a wording change happens in
//! exactly one place. The reply contract is deliberately rigid: the parser
//! in the vision stage accepts a single category word and nothing else, so
//! every instruction below exists to keep the model from elaborating.

/// System prompt for classifying one work-order page image.
///
/// The model must answer with exactly one of the four label words; anything
/// else is treated as "no usable answer" by the caller.
pub const CLASSIFY_PAGE_PROMPT: &str = r#"You are classifying a single page from a utility work-order package. Look at the page image and decide which one of these categories it belongs to:

SKETCH - a construction sketch or drawing: dimensioned line work, plan or profile views, pole framing details, a title block with drawing numbers, "not to scale" notes
MAP - a circuit or location map: legend symbols, street grids, pole-number annotations, highlighted circuit routes
PHOTO - a real-world photograph: field conditions, equipment, poles, job sites, or a page of pasted photographs
FORM - an administrative form: checkbox-heavy layouts, labelled fill-in fields, checklists, billing or crew sheets

Rules:

1. Answer with EXACTLY ONE WORD: SKETCH, MAP, PHOTO, or FORM
2. Do NOT add punctuation, explanations, or qualifiers
3. If the page mixes content, pick the category that dominates the page
4. A scanned paper form is FORM even if the scan itself is photographic"#;
