//! Minimal PDF authoring on top of `lopdf`.
//!
//! Two page kinds are enough for every renderer in the crate:
//!
//! * **text pages**: lines of monospaced Courier, one `BT … ET` block per
//!   page using `TL` + `T*` for line advance,
//! * **image pages**: one JPEG embedded as a `DCTDecode` XObject, page size
//!   equal to the pixel size (1 px = 1 pt).
//!
//! Courier is one of the standard 14 fonts, so nothing is embedded. Text is
//! encoded as WinAnsi. Characters outside that code page print as `?`.

use crate::error::ConvertError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Font size, line advance and page margin of a text page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub leading: f32,
    pub margin: f32,
}

impl TextStyle {
    /// Leading as a multiple of the font size.
    pub fn new(font_size: f32, line_height: f32, margin: f32) -> Self {
        Self {
            font_size,
            leading: font_size * line_height,
            margin,
        }
    }

    /// Courier glyphs are 0.6 em wide.
    pub fn chars_per_line(&self, page_width: f32) -> usize {
        let usable = (page_width - 2.0 * self.margin).max(0.0);
        ((usable / (self.font_size * 0.6)).floor() as usize).max(1)
    }

    /// Lines that fit between the top and bottom margins.
    pub fn lines_per_page(&self, page_height: f32) -> usize {
        let usable = (page_height - 2.0 * self.margin).max(0.0);
        (usable / self.leading).floor() as usize + 1
    }
}

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Add a page of `(width, height)` points holding `lines` from the top
    /// margin down. Callers paginate; overflowing lines run off the page.
    pub fn add_text_page(
        &mut self,
        (width, height): (f32, f32),
        lines: &[String],
        style: &TextStyle,
    ) -> Result<(), ConvertError> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), style.font_size.into()]),
            Operation::new("TL", vec![style.leading.into()]),
            Operation::new("Td", vec![style.margin.into(), (height - style.margin).into()]),
        ];
        for line in lines {
            if !line.is_empty() {
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
                ));
            }
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        };
        self.push_page(width, height, operations, resources)
    }

    /// Add a page showing one baseline JPEG (RGB) at 1 px = 1 pt.
    pub fn add_jpeg_page(
        &mut self,
        jpeg: Vec<u8>,
        width_px: u32,
        height_px: u32,
    ) -> Result<(), ConvertError> {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let (w, h) = (width_px as f32, height_px as f32);
        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    w.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    h.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ];
        let resources = dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        };
        self.push_page(w, h, operations, resources)
    }

    fn push_page(
        &mut self,
        width: f32,
        height: f32,
        operations: Vec<Operation>,
        resources: lopdf::Dictionary,
    ) -> Result<(), ConvertError> {
        let content = Content { operations }
            .encode()
            .map_err(|e| ConvertError::Internal(format!("encoding page content: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ConvertError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| ConvertError::Internal(format!("writing PDF: {e}")))?;
        Ok(buf)
    }
}

// ── WinAnsi ─────────────────────────────────────────────────────────────

/// Code points of WinAnsi bytes 0x80..=0x9F. `None` marks unassigned bytes.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('€'), None, Some('‚'), Some('ƒ'), Some('„'), Some('…'), Some('†'), Some('‡'),
    Some('ˆ'), Some('‰'), Some('Š'), Some('‹'), Some('Œ'), None, Some('Ž'), None,
    None, Some('‘'), Some('’'), Some('“'), Some('”'), Some('•'), Some('–'), Some('—'),
    Some('˜'), Some('™'), Some('š'), Some('›'), Some('œ'), None, Some('ž'), Some('Ÿ'),
];

/// Encode text as WinAnsi bytes, replacing unmappable characters with `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (0x20..0x7F).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
                return cp as u8;
            }
            WIN_ANSI_HIGH
                .iter()
                .position(|m| *m == Some(c))
                .map(|i| 0x80 + i as u8)
                .unwrap_or(b'?')
        })
        .collect()
}

/// Decode WinAnsi bytes.
pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WIN_ANSI_HIGH[(b - 0x80) as usize].unwrap_or('?'),
            _ => b as char,
        })
        .collect()
}
