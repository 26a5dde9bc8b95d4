//! Error types for the workpack-assets library.
//!
//! Almost nothing in this subsystem is fatal for the caller's process: the
//! worst case is an empty or partial result plus a descriptive summary
//! string. [`ExtractError`] therefore only surfaces from the *lower-level*
//! operations (`analyze_pages_by_content`, `convert_pages_to_images`,
//! `inspect`) where the caller asked a direct question and deserves a direct
//! answer — a missing file, a corrupt document, a misconfiguration.
//!
//! The top-level `extract_all_assets` never returns an error at all. It
//! catches every failure internally and reports it through the summary
//! string, because its caller is a detached background task that must not
//! crash the job it was spawned from.
//!
//! Per-page failures (a corrupt page, a render glitch, a flaky vision call)
//! are not errors in either sense: they are logged and the page is skipped
//! or defaulted, per the over-include-as-photo bias of the classifier.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the lower-level extraction operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your network connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease the download timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and the document cannot be opened.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The document is encrypted and no password was supplied.
    #[error("PDF is password-protected: '{path}'\nSupply the password via ExtractionConfig::password.")]
    PasswordRequired { path: PathBuf },

    /// The supplied password did not unlock the document.
    #[error("Wrong password for PDF: '{path}'")]
    WrongPassword { path: PathBuf },

    /// The native renderer library could not be loaded.
    ///
    /// Gated entry points never see this (they check [`crate::Capabilities`]
    /// first); it surfaces only when a pipeline stage is driven directly on a
    /// host without pdfium.
    #[error("PDF renderer unavailable: {0}\nInstall pdfium or set PDFIUM_LIB_PATH.")]
    RendererUnavailable(String),

    /// pdfium returned an error while rasterising a specific page.
    ///
    /// Batch operations catch this per page and continue; it only reaches
    /// callers that ask for a single page directly.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    // ── Vision errors ─────────────────────────────────────────────────────
    /// The vision model call failed (transport, non-2xx, timeout).
    ///
    /// The classifier catches this and falls back to `None`; it is never
    /// propagated out of the orchestrator.
    #[error("Vision model call failed: {detail}")]
    VisionCall { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write a rendered JPEG.
    #[error("Failed to write output '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task, tempfile failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_pdf_display() {
        let e = ExtractError::CorruptPdf {
            path: PathBuf::from("/tmp/bad.pdf"),
            detail: "xref table missing".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/bad.pdf"), "got: {msg}");
        assert!(msg.contains("xref table missing"), "got: {msg}");
    }

    #[test]
    fn render_failed_display() {
        let e = ExtractError::RenderFailed {
            page: 7,
            detail: "bitmap allocation failed".into(),
        };
        assert!(e.to_string().contains("page 7"));
    }

    #[test]
    fn not_a_pdf_shows_magic() {
        let e = ExtractError::NotAPdf {
            path: PathBuf::from("report.docx"),
            magic: *b"PK\x03\x04",
        };
        assert!(e.to_string().contains("report.docx"));
    }

    #[test]
    fn download_timeout_display() {
        let e = ExtractError::DownloadTimeout {
            url: "https://example.invalid/doc.pdf".into(),
            secs: 120,
        };
        assert!(e.to_string().contains("120s"));
    }
}
