//! Configuration types for the conversion service.
//!
//! Two structs, two lifetimes:
//!
//! * [`ServiceConfig`]: process-wide, read-only once the
//!   [`crate::convert::Dispatcher`] is built: binary names, timeouts,
//!   diagnostic mode, which fallbacks are enabled. Shared by every job.
//! * [`ConversionOptions`]: per job, target-format specific (DPI, OCR
//!   language, page size …). Built through [`ConversionOptionsBuilder`],
//!   whose `build()` rejects out-of-range values before a job exists.
//!
//! Both use the builder pattern so callers set only what they care about and
//! rely on documented defaults for the rest.

use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default separator placed between pages of extracted text.
pub const DEFAULT_JOIN_PAGES: &str = "\n\n----- PAGE BREAK -----\n\n";

/// Process-wide configuration of the conversion service.
#[derive(Clone)]
pub struct ServiceConfig {
    /// Office suite executable (`soffice`). Bare names are looked up on `PATH`.
    pub office_binary: String,

    /// Poppler `pdftotext` executable used for layout-preserving extraction.
    pub pdftotext_binary: String,

    /// Poppler `pdftoppm` executable used as the fallback rasteriser.
    pub pdftoppm_binary: String,

    /// Tesseract executable used for OCR recovery.
    pub tesseract_binary: String,

    /// Explicit pdfium shared library. If None, `./` and the system library
    /// path are tried.
    pub pdfium_library: Option<PathBuf>,

    /// Timeout for office-suite conversions, in seconds. Default: 300.
    pub office_timeout_secs: u64,

    /// Timeout for every other external tool invocation, in seconds. Default: 120.
    pub tool_timeout_secs: u64,

    /// Directory under which job workspaces are created. If None, the
    /// system temp dir.
    pub temp_root: Option<PathBuf>,

    /// Keep the workspace of failed jobs and report its path in the failure.
    /// Default: false. Never enable for untrusted clients.
    pub diagnostic_mode: bool,

    /// Append the text-only slide renderer after the office suite for
    /// PPTX→PDF. Default: true.
    pub slide_text_fallback: bool,

    /// DPI used when rasterising pages for OCR. Default: 300.
    pub ocr_dpi: u32,

    /// Optional per-job event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            office_binary: "soffice".to_string(),
            pdftotext_binary: "pdftotext".to_string(),
            pdftoppm_binary: "pdftoppm".to_string(),
            tesseract_binary: "tesseract".to_string(),
            pdfium_library: None,
            office_timeout_secs: 300,
            tool_timeout_secs: 120,
            temp_root: None,
            diagnostic_mode: false,
            slide_text_fallback: true,
            ocr_dpi: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("office_binary", &self.office_binary)
            .field("pdftotext_binary", &self.pdftotext_binary)
            .field("pdftoppm_binary", &self.pdftoppm_binary)
            .field("tesseract_binary", &self.tesseract_binary)
            .field("pdfium_library", &self.pdfium_library)
            .field("office_timeout_secs", &self.office_timeout_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("temp_root", &self.temp_root)
            .field("diagnostic_mode", &self.diagnostic_mode)
            .field("slide_text_fallback", &self.slide_text_fallback)
            .field("ocr_dpi", &self.ocr_dpi)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn office_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.office_binary = bin.into();
        self
    }

    pub fn pdftotext_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.pdftotext_binary = bin.into();
        self
    }

    pub fn pdftoppm_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.pdftoppm_binary = bin.into();
        self
    }

    pub fn tesseract_binary(mut self, bin: impl Into<String>) -> Self {
        self.config.tesseract_binary = bin.into();
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn office_timeout_secs(mut self, secs: u64) -> Self {
        self.config.office_timeout_secs = secs;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(dir.into());
        self
    }

    pub fn diagnostic_mode(mut self, v: bool) -> Self {
        self.config.diagnostic_mode = v;
        self
    }

    pub fn slide_text_fallback(mut self, v: bool) -> Self {
        self.config.slide_text_fallback = v;
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ConvertError> {
        let c = &self.config;
        if c.office_timeout_secs == 0 || c.tool_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        for (name, bin) in [
            ("office_binary", &c.office_binary),
            ("pdftotext_binary", &c.pdftotext_binary),
            ("pdftoppm_binary", &c.pdftoppm_binary),
            ("tesseract_binary", &c.tesseract_binary),
        ] {
            if bin.trim().is_empty() {
                return Err(ConvertError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        Ok(self.config)
    }
}

// ── Per-job options ─────────────────────────────────────────────────────

/// Per-job conversion options. Fields irrelevant to the target are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Rasterisation DPI for PDF→JPG (50–600, default 200) and PDF→PPTX
    /// (72–400, default 150).
    pub dpi: u32,

    /// Run OCR recovery on pages with too little extractable text. Default: true.
    pub ocr: bool,

    /// Tesseract language code. Default: "eng".
    pub lang: String,

    /// Page size for rendered PDFs. Default: A4.
    pub page_size: PageSize,

    /// Try layout-preserving extraction first for PDF→TXT. Default: true.
    pub preserve_layout: bool,

    /// PDF→JPG returns only the first page as a single JPEG. Default: false.
    pub first_page_only: bool,

    /// Separator between pages of extracted text.
    pub join_pages: String,

    /// Explicit backend choice for conversions that offer one
    /// (spreadsheet → PDF). Default: native.
    pub backend: Backend,
}

impl ConversionOptions {
    /// Defaults appropriate for the given target format.
    pub fn for_target(target: TargetFormat) -> Self {
        Self {
            dpi: default_dpi(target),
            ocr: true,
            lang: "eng".to_string(),
            page_size: PageSize::default(),
            preserve_layout: true,
            first_page_only: false,
            join_pages: DEFAULT_JOIN_PAGES.to_string(),
            backend: Backend::default(),
        }
    }

    /// Create a builder seeded with the defaults for `target`.
    pub fn builder(target: TargetFormat) -> ConversionOptionsBuilder {
        ConversionOptionsBuilder {
            target,
            options: Self::for_target(target),
        }
    }
}

fn default_dpi(target: TargetFormat) -> u32 {
    match target {
        TargetFormat::Jpg => 200,
        TargetFormat::Pptx => 150,
        _ => 150,
    }
}

/// Inclusive DPI bounds accepted for a target format.
pub fn dpi_bounds(target: TargetFormat) -> (u32, u32) {
    match target {
        TargetFormat::Jpg => (50, 600),
        TargetFormat::Pptx => (72, 400),
        _ => (50, 600),
    }
}

/// Builder for [`ConversionOptions`].
#[derive(Debug)]
pub struct ConversionOptionsBuilder {
    target: TargetFormat,
    options: ConversionOptions,
}

impl ConversionOptionsBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.options.dpi = dpi;
        self
    }

    pub fn ocr(mut self, v: bool) -> Self {
        self.options.ocr = v;
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.options.lang = lang.into();
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.options.page_size = size;
        self
    }

    pub fn preserve_layout(mut self, v: bool) -> Self {
        self.options.preserve_layout = v;
        self
    }

    pub fn first_page_only(mut self, v: bool) -> Self {
        self.options.first_page_only = v;
        self
    }

    pub fn join_pages(mut self, sep: impl Into<String>) -> Self {
        self.options.join_pages = sep.into();
        self
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.options.backend = backend;
        self
    }

    /// Build the options, validating constraints for the target format.
    pub fn build(self) -> Result<ConversionOptions, ConvertError> {
        let o = &self.options;
        let (lo, hi) = dpi_bounds(self.target);
        if o.dpi < lo || o.dpi > hi {
            return Err(ConvertError::InvalidConfig(format!(
                "DPI for {} must be {lo}–{hi}, got {}",
                self.target, o.dpi
            )));
        }
        // Tesseract language codes: "eng", "deu+eng", "chi_sim".
        let lang_ok = !o.lang.is_empty()
            && o.lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+');
        if !lang_ok {
            return Err(ConvertError::InvalidConfig(format!(
                "Invalid OCR language code '{}'",
                o.lang
            )));
        }
        Ok(self.options)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output page size for rendered PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// `(width, height)` in PDF points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.2756, 841.8898),
            PageSize::Letter => (612.0, 792.0),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A4" => Ok(PageSize::A4),
            "LETTER" => Ok(PageSize::Letter),
            other => Err(format!("page size must be A4 or LETTER, got '{other}'")),
        }
    }
}

/// Which conversion backend a job asks for, where a choice exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process renderer (default).
    #[default]
    Native,
    /// External office suite first, native renderer as fallback.
    OfficeSuite,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "reportlab" => Ok(Backend::Native),
            "office" | "office_suite" | "office-suite" | "soffice" | "libreoffice" => {
                Ok(Backend::OfficeSuite)
            }
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}
