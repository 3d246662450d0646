//! # docconv
//!
//! Convert office documents, images and PDFs into other document formats,
//! picking the best backend installed on the host.
//!
//! ## Why this crate?
//!
//! Document conversion on a server usually means shelling out to
//! LibreOffice, poppler and tesseract, each of which can be missing, hang,
//! or produce nothing. This crate wraps them behind one dispatcher that
//! tries an ordered list of strategies per format pair, from the
//! highest-fidelity backend down to pure-Rust fallbacks, with hard timeouts,
//! a private workspace per job and a typed error when every strategy fails.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ConversionJob
//!  │
//!  ├─ 1. Validate   empty input, source count
//!  ├─ 2. Resolve    (source, target) → StrategyChain (static table)
//!  ├─ 3. Workspace  temp dir + isolated office profile
//!  ├─ 4. Chain      office-suite / poppler / pdfium / lopdf / tesseract …
//!  └─ 5. Output     bytes + filename + content type + stats
//! ```
//!
//! ## Supported conversions
//!
//! | From | To |
//! |------|----|
//! | DOCX / DOC, XLSX / XLS, PPTX / PPT, TXT | PDF |
//! | images (PNG, JPEG, BMP) | one PDF |
//! | PDF | TXT, JPG (or ZIP of JPGs), PPTX, XLSX, DOCX |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docconv::{ConversionJob, Dispatcher, ServiceConfig, SourceFile, TargetFormat};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = Dispatcher::new(ServiceConfig::default());
//! let source = SourceFile::from_path("report.docx".as_ref())?;
//! let job = ConversionJob::from_filename(source, TargetFormat::Pdf)?;
//! match dispatcher.convert(&job) {
//!     Ok(out) => {
//!         std::fs::write(&out.filename, &out.bytes)?;
//!         eprintln!("converted by {}", out.stats.strategy);
//!     }
//!     Err(failure) => eprintln!("{}: {}", failure.kind, failure.message),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docconv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docconv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod capabilities;
pub mod config;
pub mod convert;
pub mod converters;
pub mod error;
pub mod format;
pub mod job;
pub mod output;
pub mod pdf_reader;
pub mod pdf_writer;
pub mod pdfium;
pub mod process;
pub mod progress;
pub mod stream;
pub mod strategy;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use capabilities::{Capabilities, Tool};
pub use config::{
    Backend, ConversionOptions, ConversionOptionsBuilder, PageSize, ServiceConfig,
    ServiceConfigBuilder, DEFAULT_JOIN_PAGES,
};
pub use convert::Dispatcher;
pub use error::{AttemptFailure, ConversionFailure, ConvertError, ErrorKind};
pub use format::{SourceFormat, TargetFormat};
pub use job::{ConversionJob, SourceFile};
pub use output::{ConversionOutput, ConversionResult, ConversionStats};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_all, convert_stream, JobStream};
pub use strategy::{Strategy, StrategyChain, StrategyTable};
