//! Ordered strategy fallback.
//!
//! ## Why a static table?
//!
//! Every supported `(source, target)` pair maps to a fixed priority list of
//! strategies: the highest-fidelity backend first, degraded fallbacks after
//! it. The list is decided here and nowhere else, so converters never look
//! for tools or call each other. A converter either produces bytes or
//! reports why it could not, and [`StrategyChain::run`] decides whether the
//! next candidate gets a turn:
//!
//! | Error kind | Chain behaviour |
//! |------------|-----------------|
//! | `BackendUnavailable`, `Timeout`, `ProcessFailure`, `Unusable`, I/O | record, try next |
//! | `EmptyInput`, `MalformedInput`, `UnsupportedConversion`, `InvalidConfig` | return immediately |
//!
//! A strategy whose required tool is missing from [`Capabilities`] is
//! recorded as `BackendUnavailable` without being invoked.

use crate::capabilities::{Capabilities, Tool};
use crate::config::{Backend, ConversionOptions, ServiceConfig};
use crate::converters::images::ImageComposeStrategy;
use crate::converters::ocr::OcrRecovery;
use crate::converters::office::OfficeSuiteStrategy;
use crate::converters::pdf_docx::TextDocxStrategy;
use crate::converters::pdf_excel::{LayoutTablesStrategy, PageTablesStrategy};
use crate::converters::pdf_text::{LayoutTextStrategy, PageTextStrategy};
use crate::converters::raster::{RasterJpgStrategy, RasterPptxStrategy, Rasterizer};
use crate::converters::sheet_pdf::SheetRenderStrategy;
use crate::converters::slides::SlideTextStrategy;
use crate::converters::text_pdf::{DocxRenderStrategy, TxtRenderStrategy};
use crate::converters::PageTextSource;
use crate::error::{AttemptFailure, ConvertError, ErrorKind};
use crate::format::{SourceFormat, TargetFormat, MIME_ZIP};
use crate::job::ConversionJob;
use crate::process::ProcessRunner;
use crate::progress::ProgressCallback;
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ── Strategy trait ──────────────────────────────────────────────────────

/// Shared, read-only state a strategy runs with.
pub struct StrategyContext<'a> {
    pub config: &'a ServiceConfig,
    pub runner: &'a ProcessRunner,
    /// Source files as written into the workspace, in job order.
    pub inputs: &'a [PathBuf],
}

impl StrategyContext<'_> {
    pub fn primary_input(&self) -> Result<&Path, ConvertError> {
        self.inputs
            .first()
            .map(PathBuf::as_path)
            .ok_or_else(|| ConvertError::EmptyInput {
                detail: "no input written to workspace".into(),
            })
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.config.tool_timeout_secs)
    }
}

/// Bytes produced by one successful strategy.
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
    pub skipped_inputs: usize,
}

impl StrategyOutput {
    /// Single-file output in the target format.
    pub fn new(bytes: Vec<u8>, target: TargetFormat) -> Self {
        Self {
            bytes,
            extension: target.extension(),
            content_type: target.content_type(),
            skipped_inputs: 0,
        }
    }

    /// ZIP bundle (multi-page JPG output).
    pub fn zip(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            extension: "zip",
            content_type: MIME_ZIP,
            skipped_inputs: 0,
        }
    }

    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped_inputs = skipped;
        self
    }
}

/// One way of performing a conversion.
///
/// Implementations are stateless between calls and only write inside their
/// own `ws.scratch(self.name())` directory.
pub trait Strategy: Send + Sync {
    /// Stable identifier, used in logs, stats and scratch directory names.
    fn name(&self) -> &'static str;

    /// Tools that must be present for this strategy to be attempted.
    fn requires(&self) -> &'static [Tool] {
        &[]
    }

    fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError>;
}

// ── Chain ───────────────────────────────────────────────────────────────

struct ChainEntry {
    strategy: Arc<dyn Strategy>,
    missing: Option<Tool>,
}

/// Ordered candidates for one job.
pub struct StrategyChain {
    entries: Vec<ChainEntry>,
}

/// The winning strategy and what was tried before it.
#[derive(Debug)]
pub struct ChainSuccess {
    pub output: StrategyOutput,
    pub strategy: &'static str,
    pub attempts: Vec<AttemptFailure>,
}

impl StrategyChain {
    fn new(strategies: Vec<Arc<dyn Strategy>>, caps: &Capabilities) -> Self {
        let entries = strategies
            .into_iter()
            .map(|strategy| {
                let missing = strategy.requires().iter().copied().find(|t| !caps.has(*t));
                ChainEntry { strategy, missing }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strategy names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.strategy.name()).collect()
    }

    /// Run candidates in order until one succeeds.
    pub fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
        progress: Option<&ProgressCallback>,
    ) -> Result<ChainSuccess, ConvertError> {
        let label = job.label();
        let mut attempts = Vec::new();

        for entry in &self.entries {
            let name = entry.strategy.name();
            let result = match entry.missing {
                Some(tool) => Err(ConvertError::unavailable(
                    tool.to_string(),
                    format!("{tool} not installed; {name} skipped"),
                )),
                None => {
                    if let Some(cb) = progress {
                        cb.on_strategy_start(&label, name);
                    }
                    debug!("[{}] trying {}", label, name);
                    entry.strategy.run(job, ws, ctx)
                }
            };

            let err = match result {
                Ok(output) if output.bytes.is_empty() => ConvertError::Unusable {
                    reason: format!("{name} produced empty output"),
                },
                Ok(output) => {
                    info!("[{}] converted by {} ({} bytes)", label, name, output.bytes.len());
                    return Ok(ChainSuccess {
                        output,
                        strategy: name,
                        attempts,
                    });
                }
                Err(e) if e.is_terminal() => {
                    warn!("[{}] {} rejected input: {}", label, name, e);
                    return Err(e);
                }
                Err(e) => e,
            };

            if err.kind() == ErrorKind::BackendUnavailable {
                debug!("[{}] {} unavailable: {}", label, name, err);
            } else {
                warn!("[{}] {} failed: {}", label, name, err);
            }
            if let Some(cb) = progress {
                cb.on_strategy_failed(&label, name, &err.to_string());
            }
            attempts.push(AttemptFailure {
                strategy: name.to_string(),
                kind: err.kind(),
                message: err.to_string(),
            });
        }

        Err(ConvertError::AllStrategiesExhausted { attempts })
    }
}

// ── Table ───────────────────────────────────────────────────────────────

/// The static `(source, target) → strategies` table, bound to the detected
/// capabilities of this host.
#[derive(Clone)]
pub struct StrategyTable {
    config: ServiceConfig,
    caps: Capabilities,
}

impl StrategyTable {
    pub fn new(config: &ServiceConfig, caps: &Capabilities) -> Self {
        Self {
            config: config.clone(),
            caps: caps.clone(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Priority-ordered chain for a pair, or `UnsupportedConversion`.
    pub fn resolve(
        &self,
        source: SourceFormat,
        target: TargetFormat,
        options: &ConversionOptions,
    ) -> Result<StrategyChain, ConvertError> {
        use SourceFormat as S;
        use TargetFormat as T;

        let office_secs = self.config.office_timeout_secs;
        let document_secs = office_secs.min(self.config.tool_timeout_secs);
        let office = |filter: &'static str,
                      infilter: Option<&'static str>,
                      ext: &'static str,
                      secs: u64|
         -> Arc<dyn Strategy> {
            Arc::new(OfficeSuiteStrategy::new(
                self.config.office_binary.clone(),
                filter,
                infilter,
                ext,
                Duration::from_secs(secs),
            ))
        };

        let strategies: Vec<Arc<dyn Strategy>> = match (source, target) {
            (S::Docx, T::Pdf) => vec![
                office("pdf:writer_pdf_Export", None, "pdf", document_secs),
                Arc::new(DocxRenderStrategy),
            ],
            (S::Xlsx, T::Pdf) => {
                let mut v: Vec<Arc<dyn Strategy>> = Vec::new();
                if options.backend == Backend::OfficeSuite {
                    v.push(office("pdf:calc_pdf_Export", None, "pdf", document_secs));
                }
                v.push(Arc::new(SheetRenderStrategy));
                v
            }
            (S::Pptx, T::Pdf) => {
                let mut v = vec![office("pdf:impress_pdf_Export", None, "pdf", office_secs)];
                if self.config.slide_text_fallback {
                    v.push(Arc::new(SlideTextStrategy));
                }
                v
            }
            (S::Txt, T::Pdf) => vec![Arc::new(TxtRenderStrategy)],
            (S::Image, T::Pdf) => vec![Arc::new(ImageComposeStrategy)],
            (S::Pdf, T::Txt) => vec![
                Arc::new(LayoutTextStrategy::new(self.page_text_source(), self.ocr())),
                Arc::new(PageTextStrategy::new(
                    PageTextSource::Pdfium(self.pdfium_lib()),
                    self.ocr(),
                )),
                Arc::new(PageTextStrategy::new(PageTextSource::Lopdf, self.ocr())),
            ],
            (S::Pdf, T::Jpg) => vec![
                Arc::new(RasterJpgStrategy::new(Rasterizer::Pdfium(self.pdfium_lib()))),
                Arc::new(RasterJpgStrategy::new(self.pdftoppm())),
            ],
            (S::Pdf, T::Pptx) => vec![
                Arc::new(RasterPptxStrategy::new(Rasterizer::Pdfium(self.pdfium_lib()))),
                Arc::new(RasterPptxStrategy::new(self.pdftoppm())),
            ],
            (S::Pdf, T::Xlsx) => vec![
                Arc::new(LayoutTablesStrategy),
                Arc::new(PageTablesStrategy::new(PageTextSource::Pdfium(self.pdfium_lib()))),
                Arc::new(PageTablesStrategy::new(PageTextSource::Lopdf)),
            ],
            (S::Pdf, T::Docx) => vec![
                office(
                    "docx:MS Word 2007 XML",
                    Some("writer_pdf_import"),
                    "docx",
                    document_secs,
                ),
                Arc::new(TextDocxStrategy::new(PageTextSource::Pdfium(self.pdfium_lib()))),
                Arc::new(TextDocxStrategy::new(PageTextSource::Lopdf)),
            ],
            _ => {
                return Err(ConvertError::UnsupportedConversion {
                    source_format: source.to_string(),
                    target_format: target.to_string(),
                })
            }
        };

        Ok(StrategyChain::new(strategies, &self.caps))
    }

    fn pdfium_lib(&self) -> Option<PathBuf> {
        self.config.pdfium_library.clone()
    }

    fn pdftoppm(&self) -> Rasterizer {
        Rasterizer::Pdftoppm(self.config.pdftoppm_binary.clone())
    }

    /// Best available per-page text reader, for OCR decisions.
    fn page_text_source(&self) -> PageTextSource {
        if self.caps.pdfium {
            PageTextSource::Pdfium(self.pdfium_lib())
        } else {
            PageTextSource::Lopdf
        }
    }

    /// OCR recovery, when tesseract and some rasteriser are installed.
    fn ocr(&self) -> Option<OcrRecovery> {
        let tesseract = self.caps.path(Tool::Tesseract)?.clone();
        let raster = if self.caps.pdfium {
            Rasterizer::Pdfium(self.pdfium_lib())
        } else if self.caps.has(Tool::Pdftoppm) {
            self.pdftoppm()
        } else {
            return None;
        };
        Some(OcrRecovery::new(tesseract, raster, self.config.ocr_dpi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::SourceFile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table(caps: Capabilities) -> StrategyTable {
        StrategyTable::new(&ServiceConfig::default(), &caps)
    }

    fn opts(target: TargetFormat) -> ConversionOptions {
        ConversionOptions::for_target(target)
    }

    #[test]
    fn table_orders_candidates() {
        let t = table(Capabilities::none());
        let names = |s, tgt| t.resolve(s, tgt, &opts(tgt)).unwrap().names();
        assert_eq!(
            names(SourceFormat::Docx, TargetFormat::Pdf),
            vec!["office-suite", "docx-native-render"]
        );
        assert_eq!(names(SourceFormat::Xlsx, TargetFormat::Pdf), vec!["sheet-native-render"]);
        assert_eq!(
            names(SourceFormat::Pptx, TargetFormat::Pdf),
            vec!["office-suite", "slide-text-render"]
        );
        assert_eq!(
            names(SourceFormat::Pdf, TargetFormat::Txt),
            vec!["layout-text", "page-text:pdfium", "page-text:lopdf"]
        );
        assert_eq!(
            names(SourceFormat::Pdf, TargetFormat::Jpg),
            vec!["raster-jpg:pdfium", "raster-jpg:pdftoppm"]
        );
        assert_eq!(
            names(SourceFormat::Pdf, TargetFormat::Xlsx),
            vec!["layout-tables", "page-tables:pdfium", "page-tables:lopdf"]
        );
    }

    #[test]
    fn office_backend_option_prepends_suite() {
        let t = table(Capabilities::none());
        let o = ConversionOptions::builder(TargetFormat::Pdf)
            .backend(Backend::OfficeSuite)
            .build()
            .unwrap();
        let chain = t.resolve(SourceFormat::Xlsx, TargetFormat::Pdf, &o).unwrap();
        assert_eq!(chain.names(), vec!["office-suite", "sheet-native-render"]);
    }

    #[test]
    fn slide_fallback_can_be_disabled() {
        let config = ServiceConfig::builder().slide_text_fallback(false).build().unwrap();
        let t = StrategyTable::new(&config, &Capabilities::none());
        let chain = t
            .resolve(SourceFormat::Pptx, TargetFormat::Pdf, &opts(TargetFormat::Pdf))
            .unwrap();
        assert_eq!(chain.names(), vec!["office-suite"]);
    }

    #[test]
    fn unknown_pair_is_unsupported() {
        let t = table(Capabilities::none());
        let err = t
            .resolve(SourceFormat::Txt, TargetFormat::Jpg, &opts(TargetFormat::Jpg))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
        assert!(err.kind().is_client_error());
    }

    // ── Chain semantics with scripted strategies ──

    struct Scripted {
        name: &'static str,
        requires: &'static [Tool],
        outcome: fn() -> Result<StrategyOutput, ConvertError>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            outcome: fn() -> Result<StrategyOutput, ConvertError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                requires: &[],
                outcome,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Strategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        fn requires(&self) -> &'static [Tool] {
            self.requires
        }
        fn run(
            &self,
            _: &ConversionJob,
            _: &Workspace,
            _: &StrategyContext<'_>,
        ) -> Result<StrategyOutput, ConvertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn ok_pdf() -> Result<StrategyOutput, ConvertError> {
        Ok(StrategyOutput::new(b"%PDF".to_vec(), TargetFormat::Pdf))
    }
    fn empty() -> Result<StrategyOutput, ConvertError> {
        Ok(StrategyOutput::new(Vec::new(), TargetFormat::Pdf))
    }
    fn timeout() -> Result<StrategyOutput, ConvertError> {
        Err(ConvertError::Timeout {
            program: "soffice".into(),
            elapsed_ms: 5,
        })
    }
    fn malformed() -> Result<StrategyOutput, ConvertError> {
        Err(ConvertError::malformed("pdf", "bad xref"))
    }

    fn run_chain(
        strategies: Vec<Arc<dyn Strategy>>,
        caps: &Capabilities,
    ) -> Result<ChainSuccess, ConvertError> {
        let chain = StrategyChain::new(strategies, caps);
        let job = ConversionJob::new(
            SourceFile::new(b"x".to_vec(), "a.docx"),
            SourceFormat::Docx,
            TargetFormat::Pdf,
        );
        let ws = Workspace::acquire(None, "chain-test").unwrap();
        let config = ServiceConfig::default();
        let runner = ProcessRunner::new();
        let ctx = StrategyContext {
            config: &config,
            runner: &runner,
            inputs: &[],
        };
        chain.run(&job, &ws, &ctx, None)
    }

    #[test]
    fn falls_through_to_first_success() {
        let a = Scripted::new("a", timeout);
        let b = Scripted::new("b", empty);
        let c = Scripted::new("c", ok_pdf);
        let d = Scripted::new("d", ok_pdf);
        let out = run_chain(
            vec![a.clone(), b.clone(), c.clone(), d.clone()],
            &Capabilities::none(),
        )
        .unwrap();
        assert_eq!(out.strategy, "c");
        assert_eq!(out.attempts.len(), 2);
        assert_eq!(out.attempts[0].kind, ErrorKind::Timeout);
        assert_eq!(out.attempts[1].kind, ErrorKind::Unusable);
        assert_eq!(d.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_tool_is_skipped_without_invocation() {
        let needs_office = Arc::new(Scripted {
            name: "office",
            requires: &[Tool::OfficeSuite],
            outcome: ok_pdf,
            calls: AtomicUsize::new(0),
        });
        let native = Scripted::new("native", ok_pdf);
        let out = run_chain(vec![needs_office.clone(), native], &Capabilities::none()).unwrap();
        assert_eq!(out.strategy, "native");
        assert_eq!(out.attempts[0].kind, ErrorKind::BackendUnavailable);
        assert_eq!(needs_office.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn malformed_input_stops_the_chain() {
        let a = Scripted::new("a", malformed);
        let b = Scripted::new("b", ok_pdf);
        let err = run_chain(vec![a, b.clone()], &Capabilities::none()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhaustion_aggregates_every_attempt() {
        let err = run_chain(
            vec![Scripted::new("a", timeout), Scripted::new("b", empty)],
            &Capabilities::none(),
        )
        .unwrap_err();
        match err {
            ConvertError::AllStrategiesExhausted { attempts } => {
                let names: Vec<_> = attempts.iter().map(|a| a.strategy.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
