//! Page rasterisation: render pages to JPEG files or base64 previews.
//!
//! All pdfium work runs inside `spawn_blocking` — the underlying C++
//! library keeps thread-local state and must not be driven from async
//! contexts. Each batch opens the document once and reuses the handle for
//! every requested page; pages are rendered strictly one at a time over
//! that shared handle.
//!
//! Per-page failures (and out-of-range page numbers) skip the page with a
//! warning and the batch continues. Only a document-level failure — the
//! renderer missing, the file unopenable — errors the whole call.
//!
//! JPEG is the right codec here: the outputs are photographs and scanned
//! sheets headed for blob storage and thumbnail display, where file size
//! matters and lossless text crispness does not. pdfium hands back RGBA
//! bitmaps, so pixels are converted to RGB before encoding (JPEG has no
//! alpha channel).

use crate::capability::bind_pdfium;
use crate::error::ExtractError;
use crate::output::AssetRecord;
use crate::progress::ProgressCallback;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One page's rendering order: where the JPEG goes and what the resulting
/// record says about it.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// 1-based page number.
    pub page_number: usize,
    /// Full destination path for the JPEG.
    pub output_path: PathBuf,
    /// File name recorded on the asset, e.g. `photo_page_3.jpg`.
    pub name: String,
    /// Category noun, or the caller's prefix for direct conversions.
    pub kind: String,
}

/// Render a batch of pages to JPEG files on disk.
///
/// Returns a record per page that actually rendered; skipped pages are
/// simply absent. Destination directories must already exist.
pub async fn render_to_files(
    pdf_path: &Path,
    password: Option<&str>,
    jobs: Vec<RenderJob>,
    scale: f32,
    quality: u8,
    progress: Option<ProgressCallback>,
) -> Result<Vec<AssetRecord>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || {
        render_to_files_blocking(&path, pwd.as_deref(), &jobs, scale, quality, progress.as_ref())
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_to_files_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    jobs: &[RenderJob],
    scale: f32,
    quality: u8,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<AssetRecord>, ExtractError> {
    let pdfium = bind_pdfium().map_err(|e| ExtractError::RendererUnavailable(format!("{e:?}")))?;
    let document = crate::pipeline::introspect::open_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut records = Vec::with_capacity(jobs.len());
    for job in jobs {
        match render_one(&pages, total_pages, job.page_number, &render_config, quality) {
            Ok(Some(bytes)) => {
                if let Err(e) = std::fs::write(&job.output_path, &bytes) {
                    warn!("Page {}: write failed: {}", job.page_number, e);
                    if let Some(cb) = progress {
                        cb.on_render_error(job.page_number, &e.to_string());
                    }
                    continue;
                }
                debug!(
                    "Rendered page {} → {} ({} bytes)",
                    job.page_number,
                    job.output_path.display(),
                    bytes.len()
                );
                if let Some(cb) = progress {
                    cb.on_asset_rendered(job.page_number, &job.kind, &job.name);
                }
                records.push(AssetRecord {
                    name: job.name.clone(),
                    path: job.output_path.clone(),
                    page_number: job.page_number,
                    kind: job.kind.clone(),
                });
            }
            Ok(None) => {
                warn!(
                    "Skipping page {} (out of range, total={})",
                    job.page_number, total_pages
                );
            }
            Err(e) => {
                warn!("Page {}: render failed: {}", job.page_number, e);
                if let Some(cb) = progress {
                    cb.on_render_error(job.page_number, &e.to_string());
                }
            }
        }
    }

    Ok(records)
}

/// Render a batch of pages to in-memory base64 JPEG previews.
///
/// Used for the vision fallback. Returns `(page_number, base64)` per page
/// that rendered; failed pages are absent and the caller treats them as
/// "no vision answer".
pub async fn render_previews(
    pdf_path: &Path,
    password: Option<&str>,
    page_numbers: &[usize],
    scale: f32,
    quality: u8,
) -> Result<Vec<(usize, String)>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let numbers = page_numbers.to_vec();

    tokio::task::spawn_blocking(move || {
        render_previews_blocking(&path, pwd.as_deref(), &numbers, scale, quality)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Preview task panicked: {}", e)))?
}

fn render_previews_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    page_numbers: &[usize],
    scale: f32,
    quality: u8,
) -> Result<Vec<(usize, String)>, ExtractError> {
    let pdfium = bind_pdfium().map_err(|e| ExtractError::RendererUnavailable(format!("{e:?}")))?;
    let document = crate::pipeline::introspect::open_document(&pdfium, pdf_path, password)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut previews = Vec::with_capacity(page_numbers.len());
    for &page_number in page_numbers {
        match render_one(&pages, total_pages, page_number, &render_config, quality) {
            Ok(Some(bytes)) => {
                let b64 = STANDARD.encode(&bytes);
                debug!("Preview page {} → {} bytes base64", page_number, b64.len());
                previews.push((page_number, b64));
            }
            Ok(None) => {
                warn!(
                    "Skipping preview for page {} (out of range, total={})",
                    page_number, total_pages
                );
            }
            Err(e) => {
                warn!("Page {}: preview render failed: {}", page_number, e);
            }
        }
    }

    Ok(previews)
}

/// Render one page to JPEG bytes. `Ok(None)` means the page number is
/// outside `[1, total_pages]`.
fn render_one(
    pages: &PdfPages<'_>,
    total_pages: usize,
    page_number: usize,
    render_config: &PdfRenderConfig,
    quality: u8,
) -> Result<Option<Vec<u8>>, ExtractError> {
    if page_number < 1 || page_number > total_pages {
        return Ok(None);
    }
    let idx = page_number - 1;

    let page = pages.get(idx as u16).map_err(|e| ExtractError::RenderFailed {
        page: page_number,
        detail: format!("{:?}", e),
    })?;

    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| ExtractError::RenderFailed {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    encode_jpeg(&image, quality)
        .map(Some)
        .map_err(|e| ExtractError::RenderFailed {
            page: page_number,
            detail: format!("JPEG encoding failed: {}", e),
        })
}

/// Encode an image as JPEG at the given quality.
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    image.to_rgb8().write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_jpeg_produces_jpeg_bytes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([0, 128, 255, 255])));
        let bytes = encode_jpeg(&img, 85).expect("encode should succeed");
        // JPEG start-of-image marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn encode_jpeg_accepts_alpha_input() {
        // Semi-transparent input still encodes; alpha is dropped in the RGB
        // conversion rather than rejected by the encoder.
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 128])));
        let bytes = encode_jpeg(&img, 70).expect("encode should succeed");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn lower_quality_means_smaller_output() {
        let mut img = RgbaImage::new(64, 64);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255]);
        }
        let img = DynamicImage::ImageRgba8(img);
        let high = encode_jpeg(&img, 95).unwrap();
        let low = encode_jpeg(&img, 20).unwrap();
        assert!(low.len() < high.len());
    }
}
