//! Pipeline stages for work-order asset extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ introspect ──▶ classify ──▶ vision ──▶ render
//! (URL/path)  (pdfium)     (keywords)  (fallback)  (JPEG files)
//! ```
//!
//! 1. [`input`]      — canonicalise the user-supplied path or URL to a local file
//! 2. [`introspect`] — read per-page text and image-operator counts; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`classify`]   — pure keyword/threshold rules over page signals; no I/O
//! 4. [`vision`]     — resolve ambiguous pages with a vision model; the only
//!    stage with network I/O, and entirely optional
//! 5. [`render`]     — rasterise category winners to JPEG files on disk

pub mod classify;
pub mod input;
pub mod introspect;
pub mod render;
pub mod vision;
