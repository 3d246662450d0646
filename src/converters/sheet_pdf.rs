//! Spreadsheet → PDF without an office suite.
//!
//! Each sheet starts on a new page with a `Sheet: <name>` heading, followed
//! by its rows as padded columns in 8pt Courier. Columns beyond the 40th
//! are dropped and long cells are shortened, so wide sheets stay legible.

use super::{ooxml, read_input, textflow};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::pdf_writer::TextStyle;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;

pub const MAX_COLUMNS: usize = 40;
const MAX_CELL_CHARS: usize = 24;

fn sheet_style() -> TextStyle {
    TextStyle::new(8.0, 1.25, 36.0)
}

fn clip(cell: &str) -> String {
    let cell = textflow::normalize_text(cell).replace('\n', " ");
    if cell.chars().count() <= MAX_CELL_CHARS {
        cell
    } else {
        let mut s: String = cell.chars().take(MAX_CELL_CHARS - 1).collect();
        s.push('…');
        s
    }
}

/// Lines for one sheet: heading, blank line, then padded rows.
pub fn sheet_lines(sheet: &ooxml::Sheet, width: usize) -> Vec<String> {
    let mut lines = vec![format!("Sheet: {}", sheet.name), String::new()];
    if sheet.rows.is_empty() {
        lines.push("(empty sheet)".to_string());
        return lines;
    }

    let rows: Vec<Vec<String>> = sheet
        .rows
        .iter()
        .map(|r| r.iter().take(MAX_COLUMNS).map(|c| clip(c)).collect())
        .collect();
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|v| v.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    for row in &rows {
        let mut line = String::new();
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                line.push_str("  ");
            }
            line.push_str(value);
            if c + 1 < row.len() {
                let pad = widths[c].saturating_sub(value.chars().count());
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        lines.extend(textflow::wrap(line.trim_end(), width));
    }
    lines
}

pub struct SheetRenderStrategy;

impl Strategy for SheetRenderStrategy {
    fn name(&self) -> &'static str {
        "sheet-native-render"
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
                "legacy .xls files need the office suite",
            ));
        }
        let sheets = ooxml::read_xlsx(&bytes)?;
        if sheets.is_empty() {
            return Err(ConvertError::Unusable {
                reason: "workbook has no sheets".into(),
            });
        }

        let page = job.options.page_size.dimensions();
        let style = sheet_style();
        let width = style.chars_per_line(page.0);
        let sections: Vec<Vec<String>> = sheets.iter().map(|s| sheet_lines(s, width)).collect();
        let pdf = textflow::render_sections(&sections, page, &style)?;
        Ok(StrategyOutput::new(pdf, TargetFormat::Pdf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::ooxml::Sheet;

    #[test]
    fn empty_sheet_placeholder() {
        let lines = sheet_lines(&Sheet { name: "Q1".into(), rows: vec![] }, 100);
        assert_eq!(lines, vec!["Sheet: Q1", "", "(empty sheet)"]);
    }

    #[test]
    fn columns_are_padded_and_capped() {
        let sheet = Sheet {
            name: "Data".into(),
            rows: vec![
                vec!["a".into(), "bb".into()],
                vec!["ccc".into(), "d".into()],
                (0..50).map(|i| i.to_string()).collect(),
            ],
        };
        let lines = sheet_lines(&sheet, 10_000);
        assert_eq!(lines[2], "a    bb");
        assert_eq!(lines[3], "ccc  d");
        let cells: Vec<&str> = lines[4].split_whitespace().collect();
        assert_eq!(cells.len(), MAX_COLUMNS);
        assert_eq!(cells.last(), Some(&"39"));
    }

    #[test]
    fn long_cells_are_clipped() {
        let long = "x".repeat(40);
        assert_eq!(clip(&long).chars().count(), MAX_CELL_CHARS);
        assert!(clip(&long).ends_with('…'));
    }
}
