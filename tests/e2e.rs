//! End-to-end integration tests for workpack-assets.
//!
//! These tests need a real work-order package PDF and a loadable pdfium
//! library, and some make live vision API calls. They are gated behind the
//! `WORKPACK_E2E` environment variable so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   WORKPACK_E2E=1 WORKPACK_E2E_PDF=./package.pdf \
//!     cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   WORKPACK_E2E=1 WORKPACK_E2E_PDF=./package.pdf \
//!     cargo test --test e2e test_inspect -- --nocapture

use std::path::PathBuf;
use std::sync::Arc;
use workpack_assets::{
    AssetExtractor, ClassificationResult, ExtractionConfig, ExtractionOutput,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless WORKPACK_E2E is set *and* WORKPACK_E2E_PDF points
/// at an existing file.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("WORKPACK_E2E").is_err() {
            println!("SKIP — set WORKPACK_E2E=1 to run e2e tests");
            return;
        }
        let p = match std::env::var("WORKPACK_E2E_PDF") {
            Ok(p) => PathBuf::from(p),
            Err(_) => {
                println!("SKIP — set WORKPACK_E2E_PDF to a work-order package PDF");
                return;
            }
        };
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Assert the category lists are sorted, in range, and mutually exclusive.
fn assert_classification_invariants(result: &ClassificationResult, context: &str) {
    let lists: [(&str, &[usize]); 4] = [
        ("drawings", &result.drawings),
        ("maps", &result.maps),
        ("photos", &result.photos),
        ("forms", &result.forms),
    ];

    let mut seen = std::collections::BTreeSet::new();
    for (name, pages) in lists {
        for window in pages.windows(2) {
            assert!(
                window[0] < window[1],
                "[{context}] {name} must be strictly ascending, got {pages:?}"
            );
        }
        for &page in pages {
            assert!(
                (1..=result.total_pages).contains(&page),
                "[{context}] {name} page {page} outside 1..={}",
                result.total_pages
            );
            assert!(
                seen.insert(page),
                "[{context}] page {page} appears in more than one category"
            );
        }
    }

    println!(
        "[{context}] ✓  {} drawings / {} maps / {} photos / {} forms over {} pages",
        result.drawings.len(),
        result.maps.len(),
        result.photos.len(),
        result.forms.len(),
        result.total_pages
    );
}

/// Assert the file at `path` exists and holds a JPEG.
fn assert_jpeg_file(path: &std::path::Path, context: &str) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|e| panic!("[{context}] cannot read {}: {e}", path.display()));
    assert!(
        bytes.len() > 100,
        "[{context}] {} suspiciously small: {} bytes",
        path.display(),
        bytes.len()
    );
    assert_eq!(
        &bytes[..2],
        &[0xFF, 0xD8],
        "[{context}] {} does not start with a JPEG SOI marker",
        path.display()
    );
}

fn assert_output_consistent(output: &ExtractionOutput, context: &str) {
    assert_eq!(
        output.stats.assets_rendered,
        output.photos.len() + output.drawings.len() + output.maps.len(),
        "[{context}] stats.assets_rendered must match the record lists"
    );
    assert!(
        !output.summary.is_empty(),
        "[{context}] summary must not be empty"
    );
}

// ── Inspect tests (no vision calls, instant) ─────────────────────────────────

#[tokio::test]
async fn test_inspect_package() {
    let path = e2e_skip_unless_ready!();

    let extractor = AssetExtractor::new(ExtractionConfig::default());
    let info = extractor
        .inspect(path.to_str().unwrap())
        .await
        .expect("inspect() should succeed");

    assert!(info.page_count > 0, "package must have at least one page");
    assert!(!info.pdf_version.is_empty());

    println!("Metadata: {:?}", info);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("WORKPACK_E2E").is_err() {
        println!("SKIP");
        return;
    }

    let extractor = AssetExtractor::new(ExtractionConfig::default());
    let result = extractor.inspect("/definitely/not/a/real/file.pdf").await;
    assert!(
        result.is_err(),
        "inspect() should return Err for nonexistent file"
    );
}

// ── Classification tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_analyze_reports_disjoint_sorted_categories() {
    let path = e2e_skip_unless_ready!();

    let extractor = AssetExtractor::new(ExtractionConfig::default());
    let result = extractor
        .analyze_pages_by_content(path.to_str().unwrap())
        .await
        .expect("analysis should succeed");

    assert!(result.total_pages > 0);
    assert_classification_invariants(&result, "analyze");
}

#[tokio::test]
async fn test_analyze_is_deterministic_without_vision() {
    use workpack_assets::{Capabilities, VisionClassifier};

    let path = e2e_skip_unless_ready!();

    // Pin vision off; the ambiguous pages then take the photo default,
    // which is deterministic.
    let analyze = || async {
        let extractor = AssetExtractor::with_parts(
            Capabilities::probe(),
            VisionClassifier::disabled(),
            ExtractionConfig::default(),
        );
        extractor
            .analyze_pages_by_content(path.to_str().unwrap())
            .await
            .expect("analysis should succeed")
    };

    let first = analyze().await;
    let second = analyze().await;
    assert_eq!(first, second, "same input must classify identically");
}

#[tokio::test]
async fn test_triage_stream_emits_in_page_order() {
    use futures::StreamExt;
    use workpack_assets::triage_stream;

    let path = e2e_skip_unless_ready!();

    let config = ExtractionConfig::default();
    let mut stream = triage_stream(path.to_str().unwrap(), &config)
        .await
        .expect("stream creation should succeed");

    let mut last_page = 0;
    let mut count = 0;
    while let Some(verdict) = stream.next().await {
        assert!(
            verdict.page_number > last_page,
            "verdicts must arrive in strictly ascending page order"
        );
        last_page = verdict.page_number;
        count += 1;
    }
    assert!(count > 0, "stream must yield at least one verdict");
    println!("[stream] {} verdicts in page order", count);
}

// ── Extraction tests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_writes_capped_assets() {
    let path = e2e_skip_unless_ready!();
    let out = tempfile::TempDir::new().expect("temp dir");

    let config = ExtractionConfig::default();
    let caps = (config.max_photos, config.max_drawings, config.max_maps);

    let extractor = AssetExtractor::new(config);
    let output = extractor
        .extract_all_assets(path.to_str().unwrap(), "e2e", out.path())
        .await;

    assert_output_consistent(&output, "extract");
    assert!(
        output.photos.len() <= caps.0,
        "photo records must respect the cap"
    );
    assert!(
        output.drawings.len() <= caps.1,
        "drawing records must respect the cap"
    );
    assert!(output.maps.len() <= caps.2, "map records must respect the cap");

    let job_dir = out.path().join("job_e2e");
    assert!(job_dir.is_dir(), "job directory must be created");

    for (records, sub) in [
        (&output.photos, "photos"),
        (&output.drawings, "drawings"),
        (&output.maps, "maps"),
    ] {
        for record in records.iter() {
            assert!(
                record.path.starts_with(job_dir.join(sub)),
                "{} must land under {sub}/",
                record.name
            );
            assert_jpeg_file(&record.path, sub);
        }
    }

    println!("[extract] {}", output.summary);
}

#[tokio::test]
async fn test_extract_never_errors_on_garbage_input() {
    if std::env::var("WORKPACK_E2E").is_err() {
        println!("SKIP");
        return;
    }
    let out = tempfile::TempDir::new().expect("temp dir");

    let extractor = AssetExtractor::new(ExtractionConfig::default());
    let output = extractor
        .extract_all_assets("/definitely/not/a/real/file.pdf", "bad", out.path())
        .await;

    assert!(
        output.summary.starts_with("PDF asset extraction"),
        "failure must fold into the summary, got: {}",
        output.summary
    );
    assert!(output.photos.is_empty());
    assert!(output.drawings.is_empty());
    assert!(output.maps.is_empty());
}

#[tokio::test]
async fn test_convert_specific_pages() {
    let path = e2e_skip_unless_ready!();
    let out = tempfile::TempDir::new().expect("temp dir");

    let extractor = AssetExtractor::new(ExtractionConfig::default());
    // Page 99999 is far out of range for any real package; it must be
    // skipped, not an error.
    let records = extractor
        .convert_pages_to_images(path.to_str().unwrap(), &[1, 99999], out.path(), "exhibit")
        .await
        .expect("conversion should succeed");

    assert_eq!(records.len(), 1, "only the in-range page should render");
    assert_eq!(records[0].name, "exhibit_page_1.jpg");
    assert_eq!(records[0].kind, "exhibit");
    assert_jpeg_file(&records[0].path, "convert");
}

// ── Callback API tests (no vision calls, always run) ─────────────────────────

/// Verifies that `ExtractionProgressCallback` can be boxed as `Arc<dyn …>`
/// and moved into a `tokio::spawn` task: the whole pipeline stores and
/// passes exactly that type, so this must stay `Send`.
#[tokio::test]
async fn test_callback_send_in_tokio_spawn() {
    use std::sync::Mutex;
    use workpack_assets::ExtractionProgressCallback;

    struct ErrorLogger {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ExtractionProgressCallback for ErrorLogger {
        fn on_render_error(&self, _page_num: usize, error: &str) {
            self.log.lock().unwrap().push(error.to_string());
        }
    }

    let logger = Arc::new(ErrorLogger {
        log: Arc::new(Mutex::new(vec![])),
    });
    let log_ref = Arc::clone(&logger.log);

    let cb: Arc<dyn ExtractionProgressCallback> =
        Arc::clone(&logger) as Arc<dyn ExtractionProgressCallback>;

    tokio::spawn(async move {
        cb.on_render_error(2, "render failed after 2 attempts");
    })
    .await
    .expect("spawn must succeed");

    let captured = log_ref.lock().unwrap().clone();
    assert_eq!(captured, vec!["render failed after 2 attempts"]);
}

/// Verify that a Noop callback compiles and does not panic.
#[test]
fn test_noop_callback_is_send_sync() {
    use workpack_assets::{ExtractionProgressCallback, NoopProgressCallback};

    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();

    let cb: Arc<dyn ExtractionProgressCallback> = Arc::new(NoopProgressCallback);
    cb.on_render_error(1, "an error");
}

// ── Config structural tests (no API calls, always run) ───────────────────────

/// Verify the config accepts a named provider without panicking or erroring
/// at build time (no API call happens until a page actually needs vision).
#[test]
fn test_config_accepts_named_provider() {
    let config = ExtractionConfig::builder()
        .asset_scale(2.0)
        .asset_quality(85)
        .build()
        .expect("builder must succeed");

    let mut cfg = config;
    cfg.provider_name = Some("ollama".to_string());
    cfg.model = Some("llava".to_string());

    assert_eq!(cfg.provider_name.as_deref(), Some("ollama"));
    assert_eq!(cfg.model.as_deref(), Some("llava"));
}

/// The caps are plain config fields; zero is a legal value and must not be
/// rejected at build time (it means "never render this category").
#[test]
fn test_zero_caps_are_legal() {
    let config = ExtractionConfig::builder()
        .max_photos(0)
        .max_drawings(0)
        .max_maps(0)
        .build()
        .expect("zero caps must build");

    assert_eq!(config.max_photos, 0);
    assert_eq!(config.max_drawings, 0);
    assert_eq!(config.max_maps, 0);
}
