//! Full-document extraction entry points.
//!
//! [`AssetExtractor`] owns everything one extraction run needs: the
//! capability probe result, the (optional) vision classifier, and the
//! configuration. Construction is cheap; callers typically build one per
//! job invocation. All dependencies are injectable, so tests can run the
//! orchestration logic with rendering declared unavailable or with a
//! stubbed vision model.
//!
//! The contract split across the entry points:
//! - [`AssetExtractor::extract_all_assets`] never returns an error. It is
//!   designed to run as a detached background task after job creation, and
//!   a crash there would take down work it does not own. Every failure
//!   folds into the summary string.
//! - The lower-level operations (`analyze_pages_by_content`,
//!   `convert_pages_to_images`, `inspect`) answer direct questions and do
//!   return errors for missing files, corrupt documents, and the like —
//!   but still degrade quietly when rendering is unavailable.

use crate::capability::Capabilities;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{
    summary_line, AssetRecord, Category, ClassificationResult, DocumentInfo, ExtractionOutput,
    ExtractionStats,
};
use crate::pipeline::render::RenderJob;
use crate::pipeline::vision::VisionClassifier;
use crate::pipeline::{classify, input, introspect, render, vision};
use crate::progress::ProgressCallback;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const PHOTOS_DIR: &str = "photos";
const DRAWINGS_DIR: &str = "drawings";
const MAPS_DIR: &str = "maps";

/// Classifies and extracts page assets from work-order PDF packages.
pub struct AssetExtractor {
    capabilities: Capabilities,
    vision: VisionClassifier,
    config: ExtractionConfig,
}

impl AssetExtractor {
    /// Build an extractor: probes rendering capability (cached process-wide)
    /// and resolves a vision provider if one is configured.
    pub fn new(config: ExtractionConfig) -> Self {
        let capabilities = Capabilities::probe();
        let vision = if capabilities.rendering_available {
            VisionClassifier::from_config(&config)
        } else {
            // No previews can be rendered, so a provider would never be called.
            VisionClassifier::disabled()
        };
        Self {
            capabilities,
            vision,
            config,
        }
    }

    /// Build from explicit parts. This is the dependency-injection seam:
    /// tests pass [`Capabilities::unavailable`] or a stub vision model.
    pub fn with_parts(
        capabilities: Capabilities,
        vision: VisionClassifier,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            capabilities,
            vision,
            config,
        }
    }

    /// Whether PDF rendering works in this environment.
    ///
    /// When false, every extraction operation short-circuits to an empty
    /// result without touching the filesystem or any model endpoint.
    pub fn is_extraction_available(&self) -> bool {
        self.capabilities.rendering_available
    }

    /// Classify every page without rendering anything.
    ///
    /// Returns the pre-cap view: all candidate pages per category, however
    /// many there are. Ambiguous pages are resolved through the vision
    /// fallback (or defaulted to photos when no model is configured), so
    /// repeated calls with a fixed document and a deterministic model give
    /// identical results.
    pub async fn analyze_pages_by_content(
        &self,
        input: &str,
    ) -> Result<ClassificationResult, ExtractError> {
        if !self.capabilities.rendering_available {
            debug!("Rendering unavailable; reporting no classifiable pages");
            return Ok(ClassificationResult::default());
        }

        let resolved = input::resolve_input(input, self.config.download_timeout_secs).await?;
        let triage = self.triage_document(resolved.path()).await?;
        Ok(ClassificationResult::from_verdicts(
            &triage.verdicts,
            triage.total_pages,
        ))
    }

    /// Render specific pages to JPEGs under `out_dir`.
    ///
    /// Files are named `{prefix}_page_{n}.jpg` and records carry `prefix`
    /// as their kind. Page numbers outside the document and pages that fail
    /// to render are omitted from the result, never errors.
    pub async fn convert_pages_to_images(
        &self,
        input: &str,
        page_numbers: &[usize],
        out_dir: &Path,
        prefix: &str,
    ) -> Result<Vec<AssetRecord>, ExtractError> {
        if !self.capabilities.rendering_available {
            debug!("Rendering unavailable; no images converted");
            return Ok(Vec::new());
        }

        let resolved = input::resolve_input(input, self.config.download_timeout_secs).await?;

        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| ExtractError::OutputWrite {
                path: out_dir.to_path_buf(),
                source: e,
            })?;

        let jobs: Vec<RenderJob> = page_numbers
            .iter()
            .map(|&n| {
                let name = format!("{prefix}_page_{n}.jpg");
                RenderJob {
                    page_number: n,
                    output_path: out_dir.join(&name),
                    name,
                    kind: prefix.to_string(),
                }
            })
            .collect();

        render::render_to_files(
            resolved.path(),
            self.config.password.as_deref(),
            jobs,
            self.config.asset_scale,
            self.config.asset_quality,
            self.config.progress_callback.clone(),
        )
        .await
    }

    /// Classify, cap, and render every asset in the document.
    ///
    /// Never fails: capability gaps and unreadable documents produce an
    /// empty result whose summary explains what happened. Output lands
    /// under `output_root/job_{job_id}/{photos,drawings,maps}`; ownership
    /// of the written files passes to the caller.
    pub async fn extract_all_assets(
        &self,
        input: &str,
        job_id: &str,
        output_root: &Path,
    ) -> ExtractionOutput {
        let start = Instant::now();

        if !self.capabilities.rendering_available {
            debug!("Rendering unavailable; extraction skipped for job {}", job_id);
            let mut output = ExtractionOutput::unavailable();
            output.stats.duration_ms = start.elapsed().as_millis() as u64;
            self.notify(|cb| cb.on_extraction_complete(&output.stats));
            return output;
        }

        match self.extract_inner(input, job_id, output_root, start).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Extraction failed for job {}: {}", job_id, e);
                let mut output = ExtractionOutput::failed(&e.to_string());
                output.stats.duration_ms = start.elapsed().as_millis() as u64;
                self.notify(|cb| cb.on_extraction_complete(&output.stats));
                output
            }
        }
    }

    /// Read document metadata without classifying or rendering.
    pub async fn inspect(&self, input: &str) -> Result<DocumentInfo, ExtractError> {
        if !self.capabilities.rendering_available {
            return Err(ExtractError::RendererUnavailable(
                "not loaded in this environment".into(),
            ));
        }
        let resolved = input::resolve_input(input, self.config.download_timeout_secs).await?;
        introspect::read_document_info(resolved.path(), self.config.password.as_deref()).await
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn extract_inner(
        &self,
        input: &str,
        job_id: &str,
        output_root: &Path,
        start: Instant,
    ) -> Result<ExtractionOutput, ExtractError> {
        info!("Starting asset extraction for job {}: {}", job_id, input);

        // ── Step 1: Resolve input ────────────────────────────────────────
        let resolved = input::resolve_input(input, self.config.download_timeout_secs).await?;
        let pdf_path = resolved.path().to_path_buf();

        // ── Step 2: Scan, classify, resolve ambiguity ────────────────────
        let triage = self.triage_document(&pdf_path).await?;
        let result = ClassificationResult::from_verdicts(&triage.verdicts, triage.total_pages);
        info!(
            "Classified {} pages: {} drawings, {} maps, {} photos, {} forms",
            triage.total_pages,
            result.drawings.len(),
            result.maps.len(),
            result.photos.len(),
            result.forms.len()
        );

        // ── Step 3: Apply per-category caps ──────────────────────────────
        // First N candidates in page order; the full candidate lists stay
        // visible through analyze_pages_by_content.
        let photo_pages = capped(&result.photos, self.config.max_photos);
        let drawing_pages = capped(&result.drawings, self.config.max_drawings);
        let map_pages = capped(&result.maps, self.config.max_maps);

        // ── Step 4: Create the output tree ───────────────────────────────
        let job_dir = output_root.join(format!("job_{job_id}"));
        for sub in [PHOTOS_DIR, DRAWINGS_DIR, MAPS_DIR] {
            let dir = job_dir.join(sub);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| ExtractError::OutputWrite { path: dir, source: e })?;
        }

        // ── Step 5: Render each capped category ──────────────────────────
        let photos = self
            .render_category(&pdf_path, &photo_pages, job_dir.join(PHOTOS_DIR), Category::Photo)
            .await;
        let drawings = self
            .render_category(
                &pdf_path,
                &drawing_pages,
                job_dir.join(DRAWINGS_DIR),
                Category::Drawing,
            )
            .await;
        let maps = self
            .render_category(&pdf_path, &map_pages, job_dir.join(MAPS_DIR), Category::Map)
            .await;

        // ── Step 6: Summarise ────────────────────────────────────────────
        let stats = ExtractionStats {
            total_pages: triage.total_pages,
            analyzed_pages: triage.analyzed,
            ambiguous_pages: triage.ambiguous,
            vision_resolved: triage.vision_resolved,
            assets_rendered: photos.len() + drawings.len() + maps.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        let summary = summary_line(
            photos.len(),
            drawings.len(),
            maps.len(),
            result.forms.len(),
            triage.total_pages,
        );
        info!("Job {}: {} ({}ms)", job_id, summary, stats.duration_ms);
        self.notify(|cb| cb.on_extraction_complete(&stats));

        Ok(ExtractionOutput {
            photos,
            drawings,
            maps,
            summary,
            stats,
        })
    }

    /// Scan the document, run the heuristic rules, and resolve ambiguous
    /// pages through the vision fallback.
    async fn triage_document(&self, pdf_path: &Path) -> Result<TriageSummary, ExtractError> {
        let scan = introspect::analyze(pdf_path, self.config.password.as_deref()).await?;
        let outcome = classify::classify_pages(&scan.signals);
        let total_pages = scan.total_pages;

        self.notify(|cb| cb.on_scan_start(total_pages));
        for (&page, &category) in &outcome.verdicts {
            self.notify(|cb| cb.on_page_classified(page, total_pages, category));
        }

        let mut verdicts = outcome.verdicts;
        let mut vision_resolved = 0;

        if !outcome.ambiguous.is_empty() {
            if self.vision.is_enabled() {
                vision_resolved = self
                    .resolve_ambiguous(pdf_path, &outcome.ambiguous, total_pages, &mut verdicts)
                    .await;
            } else {
                // No model configured: the merge law sends every ambiguous
                // page to photos, so skip the preview renders entirely.
                debug!(
                    "Vision disabled; defaulting {} ambiguous pages to photos",
                    outcome.ambiguous.len()
                );
                for signal in &outcome.ambiguous {
                    verdicts.insert(signal.page_number, Category::Photo);
                    self.notify(|cb| {
                        cb.on_page_classified(signal.page_number, total_pages, Category::Photo)
                    });
                }
            }
        }

        Ok(TriageSummary {
            verdicts,
            total_pages,
            analyzed: outcome.analyzed,
            ambiguous: outcome.ambiguous.len(),
            vision_resolved,
        })
    }

    /// Run the vision fallback for the ambiguous pages, one call at a time,
    /// merging each answer into `verdicts`. Returns how many pages the
    /// model answered with a recognised label.
    async fn resolve_ambiguous(
        &self,
        pdf_path: &Path,
        ambiguous: &[crate::output::PageSignal],
        total_pages: usize,
        verdicts: &mut BTreeMap<usize, Category>,
    ) -> usize {
        let pages: Vec<usize> = ambiguous.iter().map(|s| s.page_number).collect();

        let previews: HashMap<usize, String> = match render::render_previews(
            pdf_path,
            self.config.password.as_deref(),
            &pages,
            self.config.preview_scale,
            self.config.preview_quality,
        )
        .await
        {
            Ok(list) => list.into_iter().collect(),
            Err(e) => {
                warn!("Preview rendering failed, ambiguous pages default to photos: {}", e);
                HashMap::new()
            }
        };

        let mut resolved = 0;
        for signal in ambiguous {
            let page = signal.page_number;
            self.notify(|cb| cb.on_vision_fallback(page, total_pages));

            let label = match previews.get(&page) {
                Some(b64) => self.vision.classify(page, b64).await,
                None => None,
            };
            if label.is_some() {
                resolved += 1;
            }

            let category = vision::merged_category(label);
            verdicts.insert(page, category);
            self.notify(|cb| cb.on_page_classified(page, total_pages, category));
        }
        resolved
    }

    async fn render_category(
        &self,
        pdf_path: &Path,
        pages: &[usize],
        dir: PathBuf,
        category: Category,
    ) -> Vec<AssetRecord> {
        if pages.is_empty() {
            return Vec::new();
        }

        let jobs: Vec<RenderJob> = pages
            .iter()
            .map(|&n| {
                let name = format!("{}_page_{}.jpg", category.noun(), n);
                RenderJob {
                    page_number: n,
                    output_path: dir.join(&name),
                    name,
                    kind: category.noun().to_string(),
                }
            })
            .collect();

        match render::render_to_files(
            pdf_path,
            self.config.password.as_deref(),
            jobs,
            self.config.asset_scale,
            self.config.asset_quality,
            self.config.progress_callback.clone(),
        )
        .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("{} batch failed, category left empty: {}", category, e);
                Vec::new()
            }
        }
    }

    fn notify<F: FnOnce(&ProgressCallback)>(&self, f: F) {
        if let Some(ref cb) = self.config.progress_callback {
            f(cb);
        }
    }
}

impl Default for AssetExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

/// What triage concluded, pre-cap.
struct TriageSummary {
    verdicts: BTreeMap<usize, Category>,
    total_pages: usize,
    analyzed: usize,
    ambiguous: usize,
    vision_resolved: usize,
}

fn capped(pages: &[usize], cap: usize) -> Vec<usize> {
    pages.iter().copied().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unavailable_extractor() -> AssetExtractor {
        AssetExtractor::with_parts(
            Capabilities::unavailable(),
            VisionClassifier::disabled(),
            ExtractionConfig::default(),
        )
    }

    #[tokio::test]
    async fn unavailable_extract_returns_summary_and_writes_nothing() {
        let out = TempDir::new().unwrap();
        let extractor = unavailable_extractor();

        let output = extractor
            .extract_all_assets("/nonexistent/package.pdf", "41783", out.path())
            .await;

        assert!(output.summary.contains("unavailable"));
        assert!(output.photos.is_empty());
        assert!(output.drawings.is_empty());
        assert!(output.maps.is_empty());

        // No job directory, no files, nothing.
        let entries: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unavailable_analyze_reports_empty() {
        let extractor = unavailable_extractor();
        let result = extractor
            .analyze_pages_by_content("/nonexistent/package.pdf")
            .await
            .unwrap();
        assert_eq!(result, ClassificationResult::default());
    }

    #[tokio::test]
    async fn unavailable_convert_returns_no_records() {
        let out = TempDir::new().unwrap();
        let extractor = unavailable_extractor();
        let records = extractor
            .convert_pages_to_images("/nonexistent/package.pdf", &[1, 2], out.path(), "page")
            .await
            .unwrap();
        assert!(records.is_empty());
        let entries: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn unavailable_inspect_is_an_error() {
        let extractor = unavailable_extractor();
        let err = extractor.inspect("/nonexistent/package.pdf").await.unwrap_err();
        assert!(matches!(err, ExtractError::RendererUnavailable(_)));
    }

    #[tokio::test]
    async fn missing_file_folds_into_failed_summary() {
        let out = TempDir::new().unwrap();
        let extractor = AssetExtractor::with_parts(
            Capabilities::assume_available(),
            VisionClassifier::disabled(),
            ExtractionConfig::default(),
        );

        let output = extractor
            .extract_all_assets("/nonexistent/package.pdf", "7", out.path())
            .await;

        assert!(output.summary.starts_with("PDF asset extraction failed"));
        assert!(output.photos.is_empty() && output.drawings.is_empty() && output.maps.is_empty());
    }

    #[test]
    fn capped_takes_first_in_page_order() {
        assert_eq!(capped(&[2, 5, 9, 12], 3), vec![2, 5, 9]);
        assert_eq!(capped(&[4], 3), vec![4]);
        assert_eq!(capped(&[], 3), Vec::<usize>::new());
        assert_eq!(capped(&[1, 2], 0), Vec::<usize>::new());
    }
}
