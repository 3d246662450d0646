//! Plain-text decoding and page layout shared by the text renderers.

use crate::error::ConvertError;
use crate::pdf_writer::{PdfBuilder, TextStyle};

/// Decode bytes as UTF-8 (BOM stripped), falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// CRLF and lone CR become LF.
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn is_special_space(c: char) -> bool {
    matches!(c, '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}')
}

/// Normalise line ends, map exotic spaces to ASCII space and expand tabs to
/// four spaces.
pub fn normalize_text(text: &str) -> String {
    normalize_newlines(text)
        .chars()
        .fold(String::with_capacity(text.len()), |mut out, c| {
            match c {
                '\t' => out.push_str("    "),
                c if is_special_space(c) => out.push(' '),
                c => out.push(c),
            }
            out
        })
}

/// Greedy word wrap at `width` characters. Words longer than a line are
/// split. An empty line stays one empty line.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            out.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }
    if current_len > 0 || out.is_empty() {
        out.push(current);
    }
    out
}

/// Cut `lines` into pages of at most `per_page` lines. Always returns at
/// least one page.
pub fn paginate(lines: &[String], per_page: usize) -> Vec<Vec<String>> {
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines.chunks(per_page.max(1)).map(|c| c.to_vec()).collect()
}

/// Render sections of lines as a PDF. Each section starts on a new page and
/// spills onto further pages as needed.
pub fn render_sections(
    sections: &[Vec<String>],
    page: (f32, f32),
    style: &TextStyle,
) -> Result<Vec<u8>, ConvertError> {
    let per_page = style.lines_per_page(page.1);
    let mut pdf = PdfBuilder::new();
    for section in sections {
        for lines in paginate(section, per_page) {
            pdf.add_text_page(page, &lines, style)?;
        }
    }
    if pdf.page_count() == 0 {
        pdf.add_text_page(page, &[], style)?;
    }
    pdf.finish()
}
