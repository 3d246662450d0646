//! PDF → DOCX by text reconstruction: one paragraph per extracted line and
//! a page break between PDF pages. Layout, fonts and images are not kept.

use super::{ooxml, textflow, PageTextSource};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;

/// Paragraph lines per page, trailing blank lines dropped.
pub fn page_paragraphs(pages: &[String]) -> Vec<Vec<String>> {
    pages
        .iter()
        .map(|page| {
            let text = textflow::normalize_newlines(page);
            let mut lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
            while lines.last().is_some_and(|l| l.is_empty()) {
                lines.pop();
            }
            lines
        })
        .collect()
}

pub struct TextDocxStrategy {
    source: PageTextSource,
}

impl TextDocxStrategy {
    pub fn new(source: PageTextSource) -> Self {
        Self { source }
    }
}

impl Strategy for TextDocxStrategy {
    fn name(&self) -> &'static str {
        match self.source {
            PageTextSource::Pdfium(_) => "text-docx:pdfium",
            PageTextSource::Lopdf => "text-docx:lopdf",
        }
    }

    fn requires(&self) -> &'static [Tool] {
        self.source.requires()
    }

    fn run(
        &self,
        _job: &ConversionJob,
        _ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let pages = self.source.page_texts(ctx.primary_input()?)?;
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(ConvertError::Unusable {
                reason: "PDF has no extractable text".into(),
            });
        }
        let docx = ooxml::write_docx(&page_paragraphs(&pages))?;
        Ok(StrategyOutput::new(docx, TargetFormat::Docx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_become_paragraphs_per_page() {
        let pages = vec!["Title  \r\n\r\nBody text\n\n\n".to_string(), "Second".to_string()];
        assert_eq!(
            page_paragraphs(&pages),
            vec![
                vec!["Title".to_string(), String::new(), "Body text".to_string()],
                vec!["Second".to_string()],
            ]
        );
    }

    #[test]
    fn reconstructed_docx_reads_back() {
        let pages = page_paragraphs(&["alpha\nbeta".to_string(), "gamma".to_string()]);
        let docx = ooxml::write_docx(&pages).unwrap();
        let paragraphs = ooxml::read_docx_paragraphs(&docx).unwrap();
        let text: Vec<&str> = paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        assert_eq!(text, vec!["alpha", "beta", "gamma"]);
    }
}
