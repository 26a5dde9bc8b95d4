//! Page introspection: gather per-page content signals via pdfium.
//!
//! The scan reads each page's text layer and counts its embedded raster
//! images in a single pass over one open document handle. It runs inside
//! `spawn_blocking` because pdfium wraps a C++ library with thread-local
//! state that is not safe to call from async contexts.
//!
//! A page that fails to load or read is logged and left out of the signal
//! list; one corrupt page must not sink the scan of a 200-page package.

use crate::capability::bind_pdfium;
use crate::error::ExtractError;
use crate::output::{DocumentInfo, PageSignal};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Everything one scan pass learns about a document.
#[derive(Debug, Clone)]
pub struct DocumentScan {
    /// One signal per readable page, ascending by page number. Pages that
    /// failed to read are absent, so this can be shorter than `total_pages`.
    pub signals: Vec<PageSignal>,
    /// Page count reported by the document itself.
    pub total_pages: usize,
}

/// Scan every page of the document for classification signals.
pub async fn analyze(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentScan, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || analyze_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Scan task panicked: {}", e)))?
}

fn analyze_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentScan, ExtractError> {
    let pdfium = bind_pdfium().map_err(|e| ExtractError::RendererUnavailable(format!("{e:?}")))?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    debug!("Scanning {} pages in {}", total_pages, pdf_path.display());

    let mut signals = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        match read_page_signal(&pages, idx) {
            Ok(signal) => signals.push(signal),
            Err(e) => warn!("Skipping unreadable page {}: {}", idx + 1, e),
        }
    }

    Ok(DocumentScan {
        signals,
        total_pages,
    })
}

fn read_page_signal(pages: &PdfPages<'_>, idx: usize) -> Result<PageSignal, ExtractError> {
    let page = pages.get(idx as u16).map_err(|e| ExtractError::RenderFailed {
        page: idx + 1,
        detail: format!("{:?}", e),
    })?;

    // Image-only pages (scanned photos) legitimately have an empty text
    // layer; only a text() error counts as a page failure.
    let text = page.text().map(|t| t.all()).map_err(|e| ExtractError::RenderFailed {
        page: idx + 1,
        detail: format!("text layer unreadable: {:?}", e),
    })?;

    let image_operator_count = page
        .objects()
        .iter()
        .filter(|object| object.object_type() == PdfPageObjectType::Image)
        .count();

    Ok(PageSignal::new(idx + 1, &text, image_operator_count))
}

/// Open a document, mapping pdfium's opaque open errors to actionable ones.
///
/// Shared with the render stage so password handling stays in one place.
pub(crate) fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ExtractError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExtractError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExtractError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Read document metadata without rendering or scanning pages.
pub async fn read_document_info(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || read_document_info_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn read_document_info_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ExtractError> {
    let pdfium = bind_pdfium().map_err(|e| ExtractError::RendererUnavailable(format!("{e:?}")))?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let pages = document.pages();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentInfo {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        page_count: pages.len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
