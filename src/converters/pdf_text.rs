//! PDF → plain text.
//!
//! Two strategy shapes:
//!
//! * [`LayoutTextStrategy`] runs `pdftotext -layout`, which keeps columns
//!   and indentation. Its output is only trusted when it looks like real
//!   text (more than 50 characters and at least one line break), and is
//!   returned as written, form feeds included.
//! * [`PageTextStrategy`] asks pdfium or lopdf for each page's text and
//!   joins the pages with the job's `join_pages` separator.
//!
//! With OCR enabled, thin pages are rendered and read by tesseract after
//! the primary pass. Layout output gets recovered pages appended as marked
//! blocks; page output has the thin page replaced when OCR read more.

use super::ocr::{self, OcrRecovery};
use super::{pdftotext_layout, textflow, PageTextSource};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use tracing::{debug, warn};

/// Minimum trimmed length of acceptable layout output.
const MIN_LAYOUT_CHARS: usize = 50;

/// Whether `pdftotext -layout` output is worth returning.
pub fn layout_acceptable(text: &str) -> bool {
    text.trim().chars().count() > MIN_LAYOUT_CHARS && text.contains('\n')
}

/// Append `----- OCR RECOVERY FOR PAGE n -----` blocks to layout text.
pub fn append_recovered(mut text: String, recovered: &[(usize, String)]) -> String {
    for (index, ocr_text) in recovered {
        text.push_str("\n\n");
        text.push_str(&ocr::recovery_header(index + 1));
        text.push_str("\n\n");
        text.push_str(ocr_text);
    }
    text
}

/// Join pages with the separator and normalise line ends.
pub fn join_pages(pages: &[String], separator: &str) -> String {
    textflow::normalize_newlines(&pages.join(separator))
}

// ── Layout ──────────────────────────────────────────────────────────────

pub struct LayoutTextStrategy {
    pages: PageTextSource,
    ocr: Option<OcrRecovery>,
}

impl LayoutTextStrategy {
    /// `pages` is only consulted to find thin pages for OCR.
    pub fn new(pages: PageTextSource, ocr: Option<OcrRecovery>) -> Self {
        Self { pages, ocr }
    }
}

impl Strategy for LayoutTextStrategy {
    fn name(&self) -> &'static str {
        "layout-text"
    }

    fn requires(&self) -> &'static [Tool] {
        &[Tool::Pdftotext]
    }

    fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let opts = &job.options;
        if !opts.preserve_layout {
            return Err(ConvertError::Unusable {
                reason: "layout preservation not requested".into(),
            });
        }

        let pdf = ctx.primary_input()?;
        let scratch = ws.scratch(self.name())?;
        let raw = pdftotext_layout(
            ctx.runner,
            &ctx.config.pdftotext_binary,
            pdf,
            &scratch,
            ws.profile_dir(),
            ctx.tool_timeout(),
        )?;
        if !layout_acceptable(&raw) {
            return Err(ConvertError::Unusable {
                reason: format!("layout text too short ({} chars)", raw.trim().len()),
            });
        }

        // pdftotext's own form feeds already mark the pages.
        let mut text = raw;
        if let (true, Some(recovery)) = (opts.ocr, &self.ocr) {
            match self.pages.page_texts(pdf) {
                Ok(pages) => {
                    let recovered = recovery.recover(pdf, &pages, &opts.lang, &scratch, ctx);
                    debug!("layout-text: {} page(s) recovered by OCR", recovered.len());
                    text = append_recovered(text, &recovered);
                }
                Err(e) => warn!("Skipping OCR recovery, per-page text unavailable: {}", e),
            }
        }
        Ok(StrategyOutput::new(text.into_bytes(), TargetFormat::Txt))
    }
}

// ── Per page ────────────────────────────────────────────────────────────

pub struct PageTextStrategy {
    source: PageTextSource,
    ocr: Option<OcrRecovery>,
}

impl PageTextStrategy {
    pub fn new(source: PageTextSource, ocr: Option<OcrRecovery>) -> Self {
        Self { source, ocr }
    }
}

impl Strategy for PageTextStrategy {
    fn name(&self) -> &'static str {
        match self.source {
            PageTextSource::Pdfium(_) => "page-text:pdfium",
            PageTextSource::Lopdf => "page-text:lopdf",
        }
    }

    fn requires(&self) -> &'static [Tool] {
        self.source.requires()
    }

    fn run(
        &self,
        job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let opts = &job.options;
        let pdf = ctx.primary_input()?;
        let mut pages = self.source.page_texts(pdf)?;

        if let (true, Some(recovery)) = (opts.ocr, &self.ocr) {
            let scratch = ws.scratch(self.name())?;
            for (index, text) in recovery.recover(pdf, &pages, &opts.lang, &scratch, ctx) {
                pages[index] = text;
            }
        }

        let text = join_pages(&pages, &opts.join_pages);
        Ok(StrategyOutput::new(text.into_bytes(), TargetFormat::Txt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_JOIN_PAGES;

    #[test]
    fn layout_heuristic() {
        assert!(!layout_acceptable("short\ntext"));
        assert!(!layout_acceptable(&"x".repeat(80)));
        assert!(layout_acceptable(&format!("{}\n{}", "x".repeat(30), "y".repeat(30))));
        assert!(!layout_acceptable(&format!("   \n{}\n   ", "z".repeat(50))));
    }

    #[test]
    fn pages_join_with_separator() {
        let pages = vec!["one\r\n".to_string(), "two".to_string()];
        assert_eq!(
            join_pages(&pages, DEFAULT_JOIN_PAGES),
            "one\n\n\n----- PAGE BREAK -----\n\ntwo"
        );
        assert_eq!(join_pages(&pages, "|"), "one\n|two");
    }

    #[test]
    fn recovered_blocks_are_marked() {
        let out = append_recovered("body".to_string(), &[(1, "scanned words".to_string())]);
        assert_eq!(out, "body\n\n----- OCR RECOVERY FOR PAGE 2 -----\n\nscanned words");
    }

    #[test]
    fn names_follow_source() {
        assert_eq!(PageTextStrategy::new(PageTextSource::Lopdf, None).name(), "page-text:lopdf");
        assert_eq!(
            PageTextStrategy::new(PageTextSource::Pdfium(None), None).requires(),
            &[Tool::Pdfium]
        );
    }
}
