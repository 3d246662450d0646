//! Presentation → PDF from slide text alone.
//!
//! The degraded fallback when the office suite cannot render a deck: one
//! landscape page per slide with a `Slide n` heading and the slide's
//! paragraphs, word-wrapped. Pictures, shapes and styling are lost.

use super::{ooxml, read_input, textflow};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::pdf_writer::TextStyle;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;

fn slide_style() -> TextStyle {
    TextStyle::new(14.0, 1.4, 48.0)
}

pub fn slide_lines(number: usize, paragraphs: &[String], width: usize) -> Vec<String> {
    let mut lines = vec![format!("Slide {number}"), String::new()];
    for p in paragraphs {
        for line in textflow::normalize_text(p).split('\n') {
            lines.extend(textflow::wrap(line.trim(), width));
        }
    }
    lines
}

pub struct SlideTextStrategy;

impl Strategy for SlideTextStrategy {
    fn name(&self) -> &'static str {
        "slide-text-render"
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
                "legacy .ppt files need the office suite",
            ));
        }
        let slides = ooxml::read_pptx_slides(&bytes)?;
        if slides.is_empty() {
            return Err(ConvertError::Unusable {
                reason: "presentation has no slides".into(),
            });
        }

        let (w, h) = job.options.page_size.dimensions();
        let landscape = (w.max(h), w.min(h));
        let style = slide_style();
        let width = style.chars_per_line(landscape.0);
        let sections: Vec<Vec<String>> = slides
            .iter()
            .enumerate()
            .map(|(i, paragraphs)| slide_lines(i + 1, paragraphs, width))
            .collect();
        let pdf = textflow::render_sections(&sections, landscape, &style)?;
        Ok(StrategyOutput::new(pdf, TargetFormat::Pdf))
    }
}
