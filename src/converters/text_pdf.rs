//! Text documents rendered to PDF in-process: plain text and DOCX.

use super::{ooxml, read_input, textflow};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::pdf_writer::TextStyle;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use tracing::debug;

/// 12pt Courier, 40pt margins, 1.35 line height.
pub fn txt_style() -> TextStyle {
    TextStyle::new(12.0, 1.35, 40.0)
}

fn docx_style() -> TextStyle {
    TextStyle::new(11.0, 1.35, 50.0)
}

/// Render plain text, one PDF line per source line, no wrapping.
pub fn render_txt(bytes: &[u8], page: (f32, f32)) -> Result<Vec<u8>, ConvertError> {
    let text = textflow::normalize_text(&textflow::decode_text(bytes));
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    debug!("txt-render: {} lines", lines.len());
    textflow::render_sections(&[lines], page, &txt_style())
}

pub struct TxtRenderStrategy;

impl Strategy for TxtRenderStrategy {
    fn name(&self) -> &'static str {
        "txt-render"
    }

    fn run(
        &self,
        job: &ConversionJob,
        _ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let bytes = read_input(ctx.primary_input()?)?;
        let pdf = render_txt(&bytes, job.options.page_size.dimensions())?;
        Ok(StrategyOutput::new(pdf, TargetFormat::Pdf))
    }
}

/// Paragraphs of a DOCX, word-wrapped and laid out like plain text.
pub struct DocxRenderStrategy;

impl Strategy for DocxRenderStrategy {
    fn name(&self) -> &'static str {
        "docx-native-render"
    }

    fn run(
        &self,
        job: &ConversionJob,
        _ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let bytes = read_input(ctx.primary_input()?)?;
        if ooxml::is_ole(&bytes) {
            return Err(ConvertError::unavailable(
                Tool::OfficeSuite.to_string(),
                "legacy .doc files need the office suite",
            ));
        }
        let paragraphs = ooxml::read_docx_paragraphs(&bytes)?;
        if paragraphs.iter().all(|p| p.trim().is_empty()) {
            return Err(ConvertError::Unusable {
                reason: "document has no text".into(),
            });
        }

        let page = job.options.page_size.dimensions();
        let style = docx_style();
        let width = style.chars_per_line(page.0);
        let lines: Vec<String> = paragraphs
            .iter()
            .flat_map(|p| {
                let p = textflow::normalize_text(p);
                p.split('\n')
                    .flat_map(|l| textflow::wrap(l, width))
                    .collect::<Vec<_>>()
            })
            .collect();
        let pdf = textflow::render_sections(&[lines], page, &style)?;
        Ok(StrategyOutput::new(pdf, TargetFormat::Pdf))
    }
}
