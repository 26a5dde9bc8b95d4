//! CLI binary for workpack-assets.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use workpack_assets::{
    triage_stream, AssetExtractor, Capabilities, Category, ExtractionConfig,
    ExtractionConfigBuilder, ExtractionProgressCallback, ExtractionStats, ProgressCallback,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar over the classification pass,
/// with per-page and per-asset log lines printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Count of pages whose render failed.
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_scan_start` (called once the page count is known).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        // Spinner only until the scan reports a total.
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening package…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Classifying");
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Classifying {total_pages} pages…"))
        ));
    }

    fn on_page_classified(&self, page_num: usize, total_pages: usize, category: Category) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&category.to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_vision_fallback(&self, page_num: usize, _total_pages: usize) {
        self.bar
            .set_message(format!("page {page_num}: asking vision model…"));
    }

    fn on_asset_rendered(&self, _page_num: usize, kind: &str, name: &str) {
        self.bar
            .println(format!("  {} {:<8} {}", green("✓"), dim(kind), name));
    }

    fn on_render_error(&self, page_num: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Page {:>3}  {}", red("✗"), page_num, red(&msg)));
    }

    fn on_extraction_complete(&self, stats: &ExtractionStats) {
        self.bar.finish_and_clear();

        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} assets from {} pages  {}",
                green("✔"),
                bold(&stats.assets_rendered.to_string()),
                stats.total_pages,
                dim(&format!("{}ms", stats.duration_ms)),
            );
        } else {
            eprintln!(
                "{} {} assets from {} pages  ({} render failures)  {}",
                cyan("⚠"),
                bold(&stats.assets_rendered.to_string()),
                stats.total_pages,
                red(&failed.to_string()),
                dim(&format!("{}ms", stats.duration_ms)),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check whether the native PDF renderer loads
  workpack probe

  # Show package metadata
  workpack inspect package.pdf

  # Classify pages without writing anything
  workpack triage package.pdf
  workpack triage --stream package.pdf

  # Full extraction into ./assets/job_41783/{photos,drawings,maps}
  workpack extract package.pdf --job-id 41783 --output-root ./assets

  # Render specific pages as JPEGs
  workpack convert package.pdf --pages 3,5,7 --out-dir ./exhibits --prefix exhibit

  # From a URL, JSON output
  workpack extract https://files.example.com/pkg.pdf --job-id 7 \
      --output-root /tmp/assets --json

CLASSIFICATION:
  Pages are classified from their text layer: forms first (checklists, USA
  tickets, billing sheets), then construction drawings, then circuit maps,
  then photo pages. Pages carrying embedded images but little text are put
  to a vision model when a credential is configured, and default to photos
  otherwise. No credential is ever required.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key (auto-detected for the fallback)
  WORKPACK_VISION_PROVIDER  Vision provider (openai, anthropic, gemini, ollama)
  WORKPACK_VISION_MODEL     Vision model ID (default gpt-4.1-nano)
  PDFIUM_LIB_PATH           Path to an existing libpdfium build
  RUST_LOG                  Tracing filter (overrides -v / -q)

SETUP:
  The native pdfium library must be loadable: ./libpdfium.so next to the
  binary, PDFIUM_LIB_PATH, or a system install. Without it, extraction
  commands report empty results instead of failing; `workpack probe`
  tells you which case you are in.
"#;

/// Extract photos, drawings, and maps from work-order PDF packages.
#[derive(Parser, Debug)]
#[command(
    name = "workpack",
    version,
    about = "Extract photos, drawings, and maps from work-order PDF packages",
    long_about = "Classify the pages of a utility work-order PDF package by content \
(construction drawings, circuit maps, photo pages, forms) and extract the visual \
assets as JPEG files. Ambiguous pages are resolved by a vision model when an API \
key is configured; everything degrades gracefully when one is not.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vision model ID for ambiguous pages (default gpt-4.1-nano).
    #[arg(long, global = true, env = "WORKPACK_VISION_MODEL")]
    model: Option<String>,

    /// Vision provider: openai, anthropic, gemini, ollama.
    #[arg(long, global = true, env = "WORKPACK_VISION_PROVIDER")]
    provider: Option<String>,

    /// PDF user password for encrypted packages.
    #[arg(long, global = true, env = "WORKPACK_PASSWORD")]
    password: Option<String>,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, global = true, env = "WORKPACK_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "WORKPACK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "WORKPACK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "WORKPACK_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, global = true, env = "WORKPACK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-page vision call timeout in seconds.
    #[arg(long, global = true, env = "WORKPACK_API_TIMEOUT", default_value_t = 30)]
    api_timeout: u64,

    /// Retries per ambiguous page on vision transport failure.
    #[arg(long, global = true, env = "WORKPACK_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the native PDF renderer loads in this environment.
    Probe,

    /// Print package metadata without classifying or rendering anything.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },

    /// Classify every page and print the per-category page lists.
    Triage {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Print verdicts one by one as they are decided.
        #[arg(long)]
        stream: bool,
    },

    /// Classify, cap, and render every asset for a job.
    Extract {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Job identifier; output lands under job_{id}/.
        #[arg(long, env = "WORKPACK_JOB_ID")]
        job_id: String,

        /// Directory that receives the job_{id} tree.
        #[arg(short, long, env = "WORKPACK_OUTPUT_ROOT", default_value = "./assets")]
        output_root: PathBuf,

        /// Most photo pages to render.
        #[arg(long, env = "WORKPACK_MAX_PHOTOS", default_value_t = 15)]
        max_photos: usize,

        /// Most drawing pages to render.
        #[arg(long, env = "WORKPACK_MAX_DRAWINGS", default_value_t = 5)]
        max_drawings: usize,

        /// Most map pages to render.
        #[arg(long, env = "WORKPACK_MAX_MAPS", default_value_t = 3)]
        max_maps: usize,
    },

    /// Render specific pages to JPEG files.
    Convert {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Pages to render: 5, 3-9, or 1,3,5.
        #[arg(long)]
        pages: String,

        /// Directory the JPEGs are written into.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// File-name prefix: files come out as {prefix}_page_{n}.jpg.
        #[arg(long, default_value = "page")]
        prefix: String,

        /// Render scale factor (0.25-4.0).
        #[arg(long, default_value_t = 2.0)]
        scale: f32,

        /// JPEG quality (10-100).
        #[arg(long, default_value_t = 85)]
        quality: u8,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Probe => run_probe(&cli),
        Command::Inspect { ref input } => run_inspect(&cli, input).await,
        Command::Triage { ref input, stream } => run_triage(&cli, input, stream, show_progress).await,
        Command::Extract {
            ref input,
            ref job_id,
            ref output_root,
            max_photos,
            max_drawings,
            max_maps,
        } => {
            run_extract(
                &cli,
                input,
                job_id,
                output_root,
                (max_photos, max_drawings, max_maps),
                show_progress,
            )
            .await
        }
        Command::Convert {
            ref input,
            ref pages,
            ref out_dir,
            ref prefix,
            scale,
            quality,
        } => run_convert(&cli, input, pages, out_dir, prefix, scale, quality).await,
    }
}

// ── Subcommand handlers ──────────────────────────────────────────────────────

fn run_probe(cli: &Cli) -> Result<()> {
    let caps = Capabilities::probe();

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "rendering_available": caps.rendering_available,
            }))?
        );
    } else if caps.rendering_available {
        println!("{} PDF rendering available", green("✔"));
    } else {
        println!(
            "{} PDF rendering unavailable (no loadable pdfium library)",
            red("✘")
        );
    }

    if !caps.rendering_available {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_inspect(cli: &Cli, input: &str) -> Result<()> {
    let config = build_config(cli, base_builder(cli, None))?;
    let extractor = AssetExtractor::new(config);
    let info = extractor
        .inspect(input)
        .await
        .context("Failed to inspect package")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File:         {}", input);
        if let Some(ref t) = info.title {
            println!("Title:        {}", t);
        }
        if let Some(ref a) = info.author {
            println!("Author:       {}", a);
        }
        if let Some(ref s) = info.subject {
            println!("Subject:      {}", s);
        }
        println!("Pages:        {}", info.page_count);
        println!("PDF Version:  {}", info.pdf_version);
        if let Some(ref p) = info.producer {
            println!("Producer:     {}", p);
        }
        if let Some(ref c) = info.creator {
            println!("Creator:      {}", c);
        }
        if let Some(ref d) = info.creation_date {
            println!("Created:      {}", d);
        }
    }
    Ok(())
}

async fn run_triage(cli: &Cli, input: &str, stream: bool, show_progress: bool) -> Result<()> {
    if stream {
        // Streaming mode prints its own per-page lines; no bar.
        let config = build_config(cli, base_builder(cli, None))?;
        let mut verdicts = triage_stream(input, &config)
            .await
            .context("Failed to start triage")?;

        while let Some(v) = verdicts.next().await {
            if cli.json {
                println!("{}", serde_json::to_string(&v)?);
            } else {
                println!(
                    "page {:>3}  {}{}",
                    v.page_number,
                    v.category,
                    if v.via_vision { dim("  (vision)") } else { String::new() },
                );
            }
        }
        return Ok(());
    }

    let progress = progress_callback(show_progress);
    let config = build_config(cli, base_builder(cli, progress))?;
    let extractor = AssetExtractor::new(config);
    let result = extractor
        .analyze_pages_by_content(input)
        .await
        .context("Failed to classify package")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Drawings:  {}", page_list(&result.drawings));
        println!("Maps:      {}", page_list(&result.maps));
        println!("Photos:    {}", page_list(&result.photos));
        println!("Forms:     {}", page_list(&result.forms));
        println!("Pages:     {}", result.total_pages);
    }
    Ok(())
}

async fn run_extract(
    cli: &Cli,
    input: &str,
    job_id: &str,
    output_root: &std::path::Path,
    caps: (usize, usize, usize),
    show_progress: bool,
) -> Result<()> {
    let (max_photos, max_drawings, max_maps) = caps;
    let progress = progress_callback(show_progress);
    let builder = base_builder(cli, progress)
        .max_photos(max_photos)
        .max_drawings(max_drawings)
        .max_maps(max_maps);
    let config = build_config(cli, builder)?;

    let extractor = AssetExtractor::new(config);
    let output = extractor.extract_all_assets(input, job_id, output_root).await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", output.summary);
    let records = output
        .drawings
        .iter()
        .chain(output.maps.iter())
        .chain(output.photos.iter());
    for record in records {
        println!("  {:<8} {}", dim(&record.kind), record.path.display());
    }
    Ok(())
}

async fn run_convert(
    cli: &Cli,
    input: &str,
    pages: &str,
    out_dir: &std::path::Path,
    prefix: &str,
    scale: f32,
    quality: u8,
) -> Result<()> {
    let page_numbers = parse_pages(pages)?;
    let builder = base_builder(cli, None).asset_scale(scale).asset_quality(quality);
    let config = build_config(cli, builder)?;

    let extractor = AssetExtractor::new(config);
    let records = extractor
        .convert_pages_to_images(input, &page_numbers, out_dir, prefix)
        .await
        .context("Failed to convert pages")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!("{} {}", green("✓"), record.path.display());
        }
        let skipped = page_numbers.len().saturating_sub(records.len());
        if skipped > 0 {
            eprintln!("{} {} page(s) skipped", cyan("⚠"), skipped);
        }
    }
    Ok(())
}

// ── Config plumbing ──────────────────────────────────────────────────────────

fn progress_callback(enabled: bool) -> Option<ProgressCallback> {
    if enabled {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    }
}

fn base_builder(cli: &Cli, progress: Option<ProgressCallback>) -> ExtractionConfigBuilder {
    let mut builder = ExtractionConfig::builder()
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder
}

/// Finish the builder and apply the fields it has no setters for.
fn build_config(cli: &Cli, builder: ExtractionConfigBuilder) -> Result<ExtractionConfig> {
    let mut config = builder.build().context("Invalid configuration")?;
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.password = cli.password.clone();
    Ok(config)
}

fn page_list(pages: &[usize]) -> String {
    if pages.is_empty() {
        return dim("none");
    }
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse `--pages` into explicit page numbers: `5`, `3-9`, or `1,3,5`.
fn parse_pages(s: &str) -> Result<Vec<usize>> {
    let s = s.trim().to_lowercase();

    // Range: "3-9"
    if let Some((start, end)) = s.split_once('-') {
        let start: usize = start.trim().parse().context("Invalid start page in range")?;
        let end: usize = end.trim().parse().context("Invalid end page in range")?;

        if start < 1 {
            anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
        }
        if start > end {
            anyhow::bail!("Invalid page range '{}-{}': start must be <= end", start, end);
        }
        return Ok((start..=end).collect());
    }

    // Set: "1,3,5"
    if s.contains(',') {
        let pages: Vec<usize> = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<usize>()
                    .context(format!("Invalid page number: '{}'", p.trim()))
            })
            .collect::<Result<Vec<_>>>()?;

        for &p in &pages {
            if p < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", p);
            }
        }
        return Ok(pages);
    }

    // Single page: "5"
    let page: usize = s.parse().context("Invalid page number")?;
    if page < 1 {
        anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
    }
    Ok(vec![page])
}
