//! Pure-Rust per-page text extraction with `lopdf`.
//!
//! This is the last-resort reader used when neither pdftotext nor pdfium is
//! installed. It walks each page's content stream and keeps the string
//! operands of the text-showing operators, starting a new line on `T*`,
//! `'`, `"`, vertical `Td`/`TD` moves and at the end of each text object.
//! Strings are decoded as WinAnsi; documents using composite fonts come out
//! garbled, which the strategy chain tolerates as a degraded result.

use crate::error::ConvertError;
use crate::pdf_writer::decode_win_ansi;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object};
use tracing::debug;

fn load(bytes: &[u8]) -> Result<Document, ConvertError> {
    Document::load_mem(bytes).map_err(|e| ConvertError::malformed("pdf", e))
}

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<usize, ConvertError> {
    Ok(load(bytes)?.get_pages().len())
}

/// Text of every page, in order.
pub fn page_texts(bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let doc = load(bytes)?;
    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for (page_num, page_id) in pages {
        let content = doc
            .get_page_content(page_id)
            .map_err(|e| ConvertError::malformed("pdf", format!("page {page_num}: {e}")))?;
        let mut text = match Content::decode(&content) {
            Ok(content) => collect_text(&content.operations),
            Err(e) => {
                debug!("page {} content undecodable: {}", page_num, e);
                String::new()
            }
        };
        if text.trim().is_empty() {
            // lopdf's own extractor understands more font encodings.
            if let Ok(alt) = doc.extract_text(&[page_num]) {
                if !alt.trim().is_empty() {
                    text = alt;
                }
            }
        }
        texts.push(text);
    }
    Ok(texts)
}

fn collect_text(operations: &[Operation]) -> String {
    let mut text = String::new();
    for op in operations {
        match op.operator.as_str() {
            "Tj" => push_string(&mut text, op.operands.first()),
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match number(item) {
                            // Large negative kerning is an inter-word gap.
                            Some(n) if n < -200.0 => text.push(' '),
                            Some(_) => {}
                            None => push_string(&mut text, Some(item)),
                        }
                    }
                }
            }
            "'" => {
                text.push('\n');
                push_string(&mut text, op.operands.first());
            }
            "\"" => {
                text.push('\n');
                push_string(&mut text, op.operands.get(2));
            }
            "T*" => text.push('\n'),
            "Td" | "TD" => {
                let ty = op.operands.get(1).and_then(number).unwrap_or(0.0);
                if ty != 0.0 && !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            "ET" => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
    text
}

fn push_string(text: &mut String, operand: Option<&Object>) {
    if let Some(Object::String(bytes, _)) = operand {
        text.push_str(&decode_win_ansi(bytes));
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
