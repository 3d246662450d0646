//! Strategy implementations, one module per conversion family.
//!
//! | Module | Strategies |
//! |--------|------------|
//! | `office` | `office-suite` (any office format → pdf, pdf → docx) |
//! | `text_pdf` | `txt-render`, `docx-native-render` |
//! | `sheet_pdf` | `sheet-native-render` |
//! | `slides` | `slide-text-render` |
//! | `images` | `image-compose` |
//! | `pdf_text` | `layout-text`, `page-text:*` |
//! | `raster` | `raster-jpg:*`, `raster-pptx:*` |
//! | `pdf_excel` | `layout-tables`, `page-tables:*` |
//! | `pdf_docx` | `text-docx:*` |
//!
//! `ocr`, `ooxml` and `textflow` are helpers shared by the strategies.

pub mod images;
pub mod ocr;
pub mod office;
pub mod ooxml;
pub mod pdf_docx;
pub mod pdf_excel;
pub mod pdf_text;
pub mod raster;
pub mod sheet_pdf;
pub mod slides;
pub mod text_pdf;
pub mod textflow;

use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::process::{ProcessRunner, ProcessSpec};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where per-page text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTextSource {
    /// pdfium, optionally from an explicit library path.
    Pdfium(Option<PathBuf>),
    /// Pure-Rust content-stream walk.
    Lopdf,
}

impl PageTextSource {
    pub fn requires(&self) -> &'static [Tool] {
        match self {
            PageTextSource::Pdfium(_) => &[Tool::Pdfium],
            PageTextSource::Lopdf => &[],
        }
    }

    pub fn page_texts(&self, pdf: &Path) -> Result<Vec<String>, ConvertError> {
        match self {
            PageTextSource::Pdfium(lib) => crate::pdfium::page_texts(pdf, lib.as_deref()),
            PageTextSource::Lopdf => crate::pdf_reader::page_texts(&read_input(pdf)?),
        }
    }
}

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, ConvertError> {
    std::fs::read(path).map_err(|e| ConvertError::io("reading job input", e))
}

/// Run `pdftotext -layout` and return its UTF-8 output with LF line ends.
/// Pages stay separated by form feeds.
pub(crate) fn pdftotext_layout(
    runner: &ProcessRunner,
    binary: &str,
    pdf: &Path,
    work_dir: &Path,
    home: &Path,
    timeout: Duration,
) -> Result<String, ConvertError> {
    let spec = ProcessSpec::new(binary, work_dir, timeout)
        .args(["-layout", "-enc", "UTF-8"])
        .arg(pdf)
        .arg("-")
        .home(home);
    let out = runner.run(&spec)?;
    if !out.success() {
        let code = out.exit_code;
        return Err(out.into_failure(binary, format!("exit status {code:?}")));
    }
    Ok(textflow::normalize_newlines(&String::from_utf8_lossy(&out.stdout)))
}

/// Split `pdftotext` output into pages on form feeds, dropping the empty
/// piece after the final one.
pub(crate) fn split_form_feeds(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}
