//! CLI binary for docconv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServiceConfig` / `ConversionOptions`, runs the jobs and writes the
//! outputs next to each other in one directory.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docconv::{
    convert_all, Backend, Capabilities, ConversionJob, ConversionOptions,
    ConversionProgressCallback, ConversionResult, Dispatcher, PageSize, ProgressCallback,
    ServiceConfig, SourceFile, TargetFormat, Tool,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the whole batch, with a log line per finished job and per
/// strategy that had to fall back. Jobs finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total_jobs: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total_jobs as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            fallbacks: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_strategy_start(&self, job: &str, strategy: &str) {
        self.bar.set_message(format!("{job} via {strategy}"));
    }

    fn on_strategy_failed(&self, job: &str, strategy: &str, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} {job}: {strategy} {}", dim("↷"), dim(&truncate(error, 100))));
    }

    fn on_job_complete(&self, job: &str, strategy: &str, bytes: usize) {
        self.bar.println(format!(
            "  {} {job}  {}",
            green("✓"),
            dim(&format!("{strategy}, {bytes} bytes"))
        ));
        self.bar.inc(1);
    }

    fn on_job_failed(&self, job: &str, error: &str) {
        self.bar
            .println(format!("  {} {job}  {}", red("✗"), red(&truncate(error, 100))));
        self.bar.inc(1);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Office document to PDF
  docconv convert report.docx --to pdf -o out/

  # Several PDFs to text, four at a time
  docconv convert a.pdf b.pdf c.pdf --to txt -c 4

  # Only the first page as JPG at 300 dpi
  docconv convert scan.pdf --to jpg --dpi 300 --first-page-only

  # Photos into one PDF
  docconv images page1.png page2.jpg -o out/

  # What can this host do?
  docconv tools --json

SUPPORTED CONVERSIONS:
  docx, doc, xlsx, xls, pptx, ppt, txt   →  pdf
  png, jpg, jpeg, bmp (many)              →  one pdf
  pdf                                     →  txt, jpg, pptx, xlsx, docx

EXTERNAL TOOLS (all optional, detected at startup):
  soffice     LibreOffice, best fidelity for office formats
  pdftotext   poppler, layout-preserving text and table detection
  pdftoppm    poppler, page rendering when pdfium is absent
  tesseract   OCR of scanned pages
  libpdfium   page rendering and text extraction
"#;

/// Convert documents between office, image, text and PDF formats.
#[derive(Parser, Debug)]
#[command(
    name = "docconv",
    version,
    about = "Convert documents between office, image, text and PDF formats",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    service: ServiceArgs,

    /// Output structured JSON instead of human-readable lines.
    #[arg(long, global = true, env = "DOCCONV_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCCONV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCCONV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCCONV_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert each input file to the target format.
    Convert(ConvertArgs),
    /// Combine images into a single PDF.
    Images(ImagesArgs),
    /// Report which external tools are available.
    Tools,
}

/// Host-level settings shared by every job.
#[derive(Args, Debug)]
struct ServiceArgs {
    /// Office suite binary.
    #[arg(long, global = true, env = "DOCCONV_OFFICE_BINARY", default_value = "soffice")]
    office_binary: String,

    /// pdftotext binary.
    #[arg(long, global = true, env = "DOCCONV_PDFTOTEXT_BINARY", default_value = "pdftotext")]
    pdftotext_binary: String,

    /// pdftoppm binary.
    #[arg(long, global = true, env = "DOCCONV_PDFTOPPM_BINARY", default_value = "pdftoppm")]
    pdftoppm_binary: String,

    /// tesseract binary.
    #[arg(long, global = true, env = "DOCCONV_TESSERACT_BINARY", default_value = "tesseract")]
    tesseract_binary: String,

    /// Path to libpdfium (directory or file). Defaults to ./ then the system library.
    #[arg(long, global = true, env = "DOCCONV_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Office suite timeout in seconds.
    #[arg(long, global = true, env = "DOCCONV_OFFICE_TIMEOUT", default_value_t = 300)]
    office_timeout: u64,

    /// Timeout of other tools in seconds.
    #[arg(long, global = true, env = "DOCCONV_TOOL_TIMEOUT", default_value_t = 120)]
    tool_timeout: u64,

    /// Directory for per-job workspaces (system temp dir by default).
    #[arg(long, global = true, env = "DOCCONV_TEMP_ROOT")]
    temp_root: Option<PathBuf>,

    /// Keep the workspace of failed jobs for inspection.
    #[arg(long, global = true, env = "DOCCONV_DIAGNOSTIC")]
    diagnostic: bool,

    /// Fail presentations instead of rendering slide text when the office suite cannot.
    #[arg(long, global = true, env = "DOCCONV_NO_SLIDE_FALLBACK")]
    no_slide_fallback: bool,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Input files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Target format: pdf, docx, pptx, xlsx, txt, jpg.
    #[arg(short, long, env = "DOCCONV_TO")]
    to: TargetFormat,

    /// Output directory.
    #[arg(short, long, env = "DOCCONV_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,

    /// Rendering DPI for jpg (50–600) and pptx (72–400) targets.
    #[arg(long, env = "DOCCONV_DPI")]
    dpi: Option<u32>,

    /// Do not OCR pages without a text layer.
    #[arg(long, env = "DOCCONV_NO_OCR")]
    no_ocr: bool,

    /// OCR language(s), tesseract syntax (e.g. eng+deu).
    #[arg(long, env = "DOCCONV_LANG", default_value = "eng")]
    lang: String,

    /// Page size for generated PDFs: a4, letter.
    #[arg(long, env = "DOCCONV_PAGE_SIZE", default_value = "a4")]
    page_size: PageSize,

    /// Skip layout-preserving text extraction.
    #[arg(long, env = "DOCCONV_NO_LAYOUT")]
    no_layout: bool,

    /// Render only the first page (jpg target).
    #[arg(long, env = "DOCCONV_FIRST_PAGE_ONLY")]
    first_page_only: bool,

    /// Separator between pages of txt output.
    #[arg(long, env = "DOCCONV_JOIN_PAGES")]
    join_pages: Option<String>,

    /// Spreadsheet backend: native, office-suite.
    #[arg(long, env = "DOCCONV_BACKEND", default_value = "native")]
    backend: Backend,

    /// Number of files converted at once.
    #[arg(short, long, env = "DOCCONV_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,
}

#[derive(Args, Debug)]
struct ImagesArgs {
    /// Image files, one page each, in order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory.
    #[arg(short, long, env = "DOCCONV_OUTPUT_DIR", default_value = ".")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !matches!(cli.command, Command::Tools);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Tools => tools(&cli),
        Command::Convert(args) => {
            let jobs = args
                .inputs
                .iter()
                .map(|path| -> Result<ConversionJob> {
                    let source = SourceFile::from_path(path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let job = ConversionJob::from_filename(source, args.to)
                        .with_context(|| format!("Cannot convert {}", path.display()))?;
                    Ok(job.with_options(build_options(args)?))
                })
                .collect::<Result<Vec<_>>>()?;
            let labels: Vec<String> = args.inputs.iter().map(|p| p.display().to_string()).collect();
            run_jobs(&cli, jobs, labels, &args.output, args.concurrency, show_progress).await
        }
        Command::Images(args) => {
            let sources = args
                .inputs
                .iter()
                .map(|path| {
                    SourceFile::from_path(path)
                        .with_context(|| format!("Failed to read {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            let label = format!("{} image(s)", sources.len());
            run_jobs(
                &cli,
                vec![ConversionJob::images(sources)],
                vec![label],
                &args.output,
                1,
                show_progress,
            ).await
        }
    }
}

/// Map CLI args to `ServiceConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ServiceConfig> {
    let s = &cli.service;
    let mut builder = ServiceConfig::builder()
        .office_binary(&s.office_binary)
        .pdftotext_binary(&s.pdftotext_binary)
        .pdftoppm_binary(&s.pdftoppm_binary)
        .tesseract_binary(&s.tesseract_binary)
        .office_timeout_secs(s.office_timeout)
        .tool_timeout_secs(s.tool_timeout)
        .diagnostic_mode(s.diagnostic)
        .slide_text_fallback(!s.no_slide_fallback);
    if let Some(ref lib) = s.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    if let Some(ref root) = s.temp_root {
        builder = builder.temp_root(root);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Map CLI args to `ConversionOptions`.
fn build_options(args: &ConvertArgs) -> Result<ConversionOptions> {
    let mut builder = ConversionOptions::builder(args.to)
        .ocr(!args.no_ocr)
        .lang(&args.lang)
        .page_size(args.page_size)
        .preserve_layout(!args.no_layout)
        .first_page_only(args.first_page_only)
        .backend(args.backend);
    if let Some(dpi) = args.dpi {
        builder = builder.dpi(dpi);
    }
    if let Some(ref sep) = args.join_pages {
        builder = builder.join_pages(sep);
    }
    builder.build().context("Invalid conversion options")
}

async fn run_jobs(
    cli: &Cli,
    jobs: Vec<ConversionJob>,
    labels: Vec<String>,
    out_dir: &Path,
    concurrency: usize,
    show_progress: bool,
) -> Result<()> {
    let bar = show_progress.then(|| CliProgressCallback::new(jobs.len()));
    let progress = bar.clone().map(|cb| cb as Arc<dyn ConversionProgressCallback>);
    let config = build_config(cli, progress)?;
    let dispatcher = Dispatcher::new(config);

    let total = jobs.len();
    let results = convert_all(&dispatcher, jobs, concurrency).await;
    if let Some(ref bar) = bar {
        bar.finish();
    }

    let mut failed = 0;
    let mut report = Vec::with_capacity(total);
    for (label, result) in labels.iter().zip(results) {
        match write_result(label, result, out_dir) {
            Ok(entry) => report.push(entry),
            Err(entry) => {
                failed += 1;
                report.push(entry);
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?,
        );
    } else if !cli.quiet {
        for entry in &report {
            match entry.get("output") {
                Some(path) => eprintln!(
                    "{} {} → {}  {}",
                    green("✔"),
                    entry["input"].as_str().unwrap_or_default(),
                    bold(path.as_str().unwrap_or_default()),
                    dim(entry["stats"]["strategy"].as_str().unwrap_or_default()),
                ),
                None => eprintln!(
                    "{} {}  {}",
                    red("✘"),
                    entry["input"].as_str().unwrap_or_default(),
                    red(entry["error"]["detail"].as_str().unwrap_or_default()),
                ),
            }
        }
        if let Some(ref bar) = bar {
            let n = bar.fallbacks.load(Ordering::SeqCst);
            if n > 0 {
                eprintln!("   {}", dim(&format!("{n} fallback(s) taken")));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} conversion(s) failed");
    }
    Ok(())
}

/// Write one output; the `Err` side carries the failure report entry.
fn write_result(
    label: &str,
    result: ConversionResult,
    out_dir: &Path,
) -> std::result::Result<serde_json::Value, serde_json::Value> {
    match result {
        Ok(output) => match output.write_to_dir(out_dir) {
            Ok(path) => Ok(json!({
                "input": label,
                "output": path.display().to_string(),
                "content_type": output.content_type,
                "bytes": output.bytes.len(),
                "stats": output.stats,
            })),
            Err(e) => Err(json!({
                "input": label,
                "error": { "kind": "internal", "detail": e.to_string() },
            })),
        },
        Err(failure) => Err(json!({ "input": label, "error": failure })),
    }
}

fn tools(cli: &Cli) -> Result<()> {
    let config = build_config(cli, None)?;
    let caps = Capabilities::detect(&config);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&caps).context("Failed to serialise capabilities")?,
        );
        return Ok(());
    }
    for tool in [
        Tool::OfficeSuite,
        Tool::Pdftotext,
        Tool::Pdftoppm,
        Tool::Tesseract,
        Tool::Pdfium,
    ] {
        let status = match (caps.has(tool), caps.path(tool)) {
            (true, Some(path)) => green(&path.display().to_string()),
            (true, None) => green("available"),
            (false, _) => red("missing"),
        };
        println!("{:<14} {}", tool.to_string(), status);
    }
    Ok(())
}
