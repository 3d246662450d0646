//! OCR recovery for pages without a text layer.
//!
//! Scanned PDFs come back from every text extractor as blank pages. When
//! OCR is requested, each page whose extracted text is shorter than
//! [`MIN_PAGE_CHARS`] is rendered to PNG and read back with tesseract.
//! Failures here never fail the conversion: a page that cannot be
//! recovered keeps whatever text it had.

use super::raster::Rasterizer;
use super::textflow;
use crate::error::ConvertError;
use crate::process::ProcessSpec;
use crate::strategy::StrategyContext;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Pages whose trimmed text is shorter than this are OCR candidates.
pub const MIN_PAGE_CHARS: usize = 20;

/// Whether a page's extracted text is too thin to trust.
pub fn needs_ocr(text: &str) -> bool {
    text.trim().chars().count() < MIN_PAGE_CHARS
}

/// Header placed above recovered text in layout output.
pub fn recovery_header(page_number: usize) -> String {
    format!("----- OCR RECOVERY FOR PAGE {page_number} -----")
}

/// Tesseract plus the rasteriser that feeds it.
#[derive(Debug, Clone)]
pub struct OcrRecovery {
    tesseract: PathBuf,
    raster: Rasterizer,
    dpi: u32,
}

impl OcrRecovery {
    pub fn new(tesseract: PathBuf, raster: Rasterizer, dpi: u32) -> Self {
        Self { tesseract, raster, dpi }
    }

    /// OCR one 0-based page. Returns an empty string when rendering or
    /// recognition fails.
    pub fn page_text(
        &self,
        pdf: &Path,
        index: usize,
        lang: &str,
        scratch: &Path,
        ctx: &StrategyContext<'_>,
    ) -> String {
        match self.try_page_text(pdf, index, lang, scratch, ctx) {
            Ok(text) => text,
            Err(e) => {
                warn!("OCR of page {} failed: {}", index + 1, e);
                String::new()
            }
        }
    }

    /// OCR every page of `pages` that [`needs_ocr`], one after another.
    /// Returns `(index, text)` for pages where recognition read more than
    /// the extractor did.
    pub fn recover(
        &self,
        pdf: &Path,
        pages: &[String],
        lang: &str,
        scratch: &Path,
        ctx: &StrategyContext<'_>,
    ) -> Vec<(usize, String)> {
        pages
            .iter()
            .enumerate()
            .filter(|(_, text)| needs_ocr(text))
            .filter_map(|(i, _)| {
                let text = self.page_text(pdf, i, lang, scratch, ctx);
                let longer = text.trim().chars().count() > pages[i].trim().chars().count();
                longer.then_some((i, text))
            })
            .collect()
    }

    fn try_page_text(
        &self,
        pdf: &Path,
        index: usize,
        lang: &str,
        scratch: &Path,
        ctx: &StrategyContext<'_>,
    ) -> Result<String, ConvertError> {
        let page_dir = scratch.join(format!("ocr-{}", index + 1));
        std::fs::create_dir_all(&page_dir)
            .map_err(|e| ConvertError::io("creating OCR directory", e))?;

        let image = self.raster.render_page(pdf, index, self.dpi, &page_dir, ctx)?;
        let png = page_dir.join("page.png");
        image
            .save_with_format(&png, ImageFormat::Png)
            .map_err(|e| ConvertError::Internal(format!("saving OCR page image: {e}")))?;

        let program = self.tesseract.to_string_lossy().into_owned();
        let spec = ProcessSpec::new(program.clone(), &page_dir, ctx.tool_timeout())
            .arg(&png)
            .arg("stdout")
            .args(["-l", lang, "--psm", "3", "--oem", "1"]);
        let out = ctx.runner.run(&spec)?;
        if !out.success() {
            let code = out.exit_code;
            return Err(out.into_failure(&program, format!("exit status {code:?}")));
        }
        let text = textflow::normalize_newlines(&out.stdout_lossy());
        debug!("OCR page {}: {} chars", index + 1, text.len());
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_pages_need_ocr() {
        assert!(needs_ocr(""));
        assert!(needs_ocr("  page 3 \n\n"));
        assert!(!needs_ocr("This page has a proper text layer."));
        assert!(needs_ocr(&format!("\n\n{}\n", "a".repeat(MIN_PAGE_CHARS - 1))));
        assert!(!needs_ocr(&"a".repeat(MIN_PAGE_CHARS)));
    }

    #[test]
    fn header_names_one_based_page() {
        assert_eq!(recovery_header(2), "----- OCR RECOVERY FOR PAGE 2 -----");
    }
}
