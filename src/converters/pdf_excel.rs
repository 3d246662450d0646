//! PDF → XLSX by spotting tables in extracted text.
//!
//! A line is a table row when it splits into at least two cells on tabs or
//! runs of two or more spaces. Two or more consecutive rows form a table.
//! Every table becomes its own sheet (`page_<p>_table_<t>`). A document
//! where no page has a table gets one sheet of raw lines per page
//! (`page_<p>_text`) instead, so the text is never silently dropped.

use super::ooxml::{self, Sheet};
use super::{pdftotext_layout, split_form_feeds, PageTextSource};
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Excel's sheet-name length limit.
const MAX_SHEET_NAME: usize = 31;

static CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").unwrap());

/// Cells of one text line; a single cell means "not a row".
pub fn split_cells(line: &str) -> Vec<String> {
    CELL_GAP
        .split(line.trim())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tables on one page, in reading order.
pub fn detect_tables(page: &str) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    for line in page.lines() {
        let cells = split_cells(line);
        if cells.len() >= 2 {
            current.push(cells);
            continue;
        }
        if current.len() >= 2 {
            tables.push(std::mem::take(&mut current));
        } else {
            current.clear();
        }
    }
    if current.len() >= 2 {
        tables.push(current);
    }
    tables
}

/// Replace characters Excel forbids, cap at 31 chars, never empty.
pub fn safe_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if matches!(c, '\\' | '/' | '*' | '[' | ']' | ':' | '?') { '_' } else { c })
        .collect();
    let trimmed: String = replaced.trim().chars().take(MAX_SHEET_NAME).collect();
    if trimmed.is_empty() {
        "sheet".to_string()
    } else {
        trimmed
    }
}

/// Sheets for a document given its per-page text.
pub fn build_sheets(pages: &[String]) -> Vec<Sheet> {
    let mut sheets = Vec::new();
    for (p, page) in pages.iter().enumerate() {
        for (t, rows) in detect_tables(page).into_iter().enumerate() {
            sheets.push(Sheet {
                name: safe_sheet_name(&format!("page_{}_table_{}", p + 1, t + 1)),
                rows,
            });
        }
    }
    if !sheets.is_empty() {
        debug!("pdf→xlsx: {} table(s) detected", sheets.len());
        return sheets;
    }

    pages
        .iter()
        .enumerate()
        .map(|(p, page)| {
            let mut rows: Vec<Vec<String>> = page.lines().map(|l| vec![l.to_string()]).collect();
            if rows.is_empty() {
                rows.push(vec![String::new()]);
            }
            Sheet {
                name: safe_sheet_name(&format!("page_{}_text", p + 1)),
                rows,
            }
        })
        .collect()
}

fn workbook(pages: &[String]) -> Result<StrategyOutput, ConvertError> {
    let bytes = ooxml::write_xlsx(&build_sheets(pages))?;
    Ok(StrategyOutput::new(bytes, TargetFormat::Xlsx))
}

// ── Strategies ──────────────────────────────────────────────────────────

/// Tables from `pdftotext -layout`, whose column spacing survives.
pub struct LayoutTablesStrategy;

impl Strategy for LayoutTablesStrategy {
    fn name(&self) -> &'static str {
        "layout-tables"
    }

    fn requires(&self) -> &'static [Tool] {
        &[Tool::Pdftotext]
    }

    fn run(
        &self,
        _job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let pdf = ctx.primary_input()?;
        let scratch = ws.scratch(self.name())?;
        let text = pdftotext_layout(
            ctx.runner,
            &ctx.config.pdftotext_binary,
            pdf,
            &scratch,
            ws.profile_dir(),
            ctx.tool_timeout(),
        )?;
        let pages = split_form_feeds(&text);
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(ConvertError::Unusable {
                reason: "pdftotext found no text".into(),
            });
        }
        workbook(&pages)
    }
}

/// Tables from per-page text of pdfium or lopdf.
pub struct PageTablesStrategy {
    source: PageTextSource,
}

impl PageTablesStrategy {
    pub fn new(source: PageTextSource) -> Self {
        Self { source }
    }
}

impl Strategy for PageTablesStrategy {
    fn name(&self) -> &'static str {
        match self.source {
            PageTextSource::Pdfium(_) => "page-tables:pdfium",
            PageTextSource::Lopdf => "page-tables:lopdf",
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
        let pdf = ctx.primary_input()?;
        let pages = self.source.page_texts(pdf)?;
        workbook(&pages)
    }
}
