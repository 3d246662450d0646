//! Just enough Office Open XML to read text out of DOCX/XLSX/PPTX packages
//! and to write the simple DOCX/XLSX/PPTX files the PDF converters produce.
//!
//! Reading is regex-based over the raw part XML. This is deliberately
//! shallow: styles, numbering, merged cells and formulas are ignored.
//! Writing emits the minimal set of parts Office and LibreOffice require.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Legacy binary Office file (`.doc`, `.xls`, `.ppt`).
pub fn is_ole(bytes: &[u8]) -> bool {
    bytes.starts_with(&OLE_MAGIC)
}

// ── Package helpers ─────────────────────────────────────────────────────

type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open<'a>(bytes: &'a [u8], format: &str) -> Result<Package<'a>, ConvertError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ConvertError::malformed(format, e))
}

fn read_part(pkg: &mut Package<'_>, name: &str) -> Result<Option<String>, ConvertError> {
    let mut file = match pkg.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ConvertError::malformed("ooxml", format!("{name}: {e}"))),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| ConvertError::malformed("ooxml", format!("{name}: {e}")))?;
    Ok(Some(xml))
}

fn require_part(pkg: &mut Package<'_>, name: &str, format: &str) -> Result<String, ConvertError> {
    read_part(pkg, name)?
        .ok_or_else(|| ConvertError::malformed(format, format!("missing part {name}")))
}

/// Write a ZIP archive (deflate) from `(name, bytes)` entries, in order.
pub fn write_zip<N: AsRef<str>>(entries: &[(N, Vec<u8>)]) -> Result<Vec<u8>, ConvertError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        writer
            .start_file(name.as_ref(), options)
            .map_err(|e| ConvertError::Internal(format!("zip entry {}: {e}", name.as_ref())))?;
        writer
            .write_all(bytes)
            .map_err(|e| ConvertError::io("writing zip entry", e))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| ConvertError::Internal(format!("finishing zip: {e}")))?;
    Ok(cursor.into_inner())
}

// ── XML text helpers ────────────────────────────────────────────────────

pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not allowed in XML 1.0.
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").unwrap());

pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY
        .replace_all(s, |caps: &regex::Captures| {
            let ent = &caps[1];
            let decoded = match ent {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if ent.starts_with("#x") => {
                    u32::from_str_radix(&ent[2..], 16).ok().and_then(char::from_u32)
                }
                _ => ent[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// ── DOCX ────────────────────────────────────────────────────────────────

static DOCX_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab/>|<w:br\b[^>]*/>|<w:cr/>|</w:p>|<w:p/>|<w:p\s[^>]*/>")
        .unwrap()
});

/// Paragraph texts of `word/document.xml`, in document order.
pub fn read_docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ConvertError> {
    let mut pkg = open(bytes, "docx")?;
    let xml = require_part(&mut pkg, "word/document.xml", "docx")?;
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for caps in DOCX_TOKEN.captures_iter(&xml) {
        let token = &caps[0];
        if let Some(text) = caps.get(1) {
            current.push_str(&unescape_xml(text.as_str()));
        } else if token == "<w:tab/>" {
            current.push('\t');
        } else if token.starts_with("<w:br") || token == "<w:cr/>" {
            current.push('\n');
        } else {
            // `</w:p>` or an empty self-closed paragraph.
            paragraphs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs)
}

const DOCX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const DOCX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// A DOCX with one paragraph per line and a page break between pages.
pub fn write_docx(pages: &[Vec<String>]) -> Result<Vec<u8>, ConvertError> {
    let mut body = String::new();
    for (i, lines) in pages.iter().enumerate() {
        if i > 0 {
            body.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
        }
        for line in lines {
            if line.is_empty() {
                body.push_str("<w:p/>");
            } else {
                body.push_str(&format!(
                    r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    escape_xml(line)
                ));
            }
        }
    }
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1134" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr></w:body></w:document>"#
    );
    write_zip(&[
        ("[Content_Types].xml", DOCX_CONTENT_TYPES.as_bytes().to_vec()),
        ("_rels/.rels", DOCX_ROOT_RELS.as_bytes().to_vec()),
        ("word/document.xml", document.into_bytes()),
    ])
}

// ── XLSX ────────────────────────────────────────────────────────────────

/// One worksheet as a dense grid of cell strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

static SHEET_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<sheet\b([^>]*)/?>").unwrap());
static RELATIONSHIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Relationship\b([^>]*)/?>").unwrap());
static SHARED_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<si\b[^>]*>(.*?)</si>").unwrap());
static TEXT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<t(?:\s[^>]*)?>(.*?)</t>").unwrap());
static ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<row\b[^>]*?(?:/>|>(.*?)</row>)").unwrap());
static CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)").unwrap());
static VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<v>(.*?)</v>").unwrap());

fn attr(attrs: &str, name: &str) -> Option<String> {
    // Attribute names are matched whole: `r` must not match `ref` or `r:id`.
    let pattern = format!(r#"(?:^|\s){}="([^"]*)""#, regex::escape(name));
    Regex::new(&pattern)
        .ok()?
        .captures(attrs)
        .map(|c| unescape_xml(&c[1]))
}

/// Zero-based column index of a cell reference such as `AB12`.
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    let idx = letters
        .to_ascii_uppercase()
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
    Some(idx - 1)
}

fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Highest column kept when reading; wider sheets are truncated.
const MAX_READ_COLUMNS: usize = 1024;

/// All worksheets in workbook order.
pub fn read_xlsx(bytes: &[u8]) -> Result<Vec<Sheet>, ConvertError> {
    let mut pkg = open(bytes, "xlsx")?;
    let workbook = require_part(&mut pkg, "xl/workbook.xml", "xlsx")?;
    let rels = read_part(&mut pkg, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();

    let targets: HashMap<String, String> = RELATIONSHIP
        .captures_iter(&rels)
        .filter_map(|c| Some((attr(&c[1], "Id")?, attr(&c[1], "Target")?)))
        .collect();

    let shared: Vec<String> = read_part(&mut pkg, "xl/sharedStrings.xml")?
        .map(|xml| {
            SHARED_ITEM
                .captures_iter(&xml)
                .map(|si| {
                    TEXT_RUN
                        .captures_iter(&si[1])
                        .map(|t| unescape_xml(&t[1]))
                        .collect::<String>()
                })
                .collect()
        })
        .unwrap_or_default();

    let mut sheets = Vec::new();
    for (i, tag) in SHEET_TAG.captures_iter(&workbook).enumerate() {
        let name = attr(&tag[1], "name").unwrap_or_else(|| format!("Sheet{}", i + 1));
        let target = attr(&tag[1], "r:id")
            .and_then(|id| targets.get(&id).cloned())
            .unwrap_or_else(|| format!("worksheets/sheet{}.xml", i + 1));
        let part = match target.strip_prefix('/') {
            Some(abs) => abs.to_string(),
            None => format!("xl/{target}"),
        };
        let xml = read_part(&mut pkg, &part)?.unwrap_or_default();
        sheets.push(Sheet {
            name,
            rows: parse_sheet_rows(&xml, &shared),
        });
    }
    Ok(sheets)
}

fn parse_sheet_rows(xml: &str, shared: &[String]) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for row in ROW.captures_iter(xml) {
        let Some(body) = row.get(1) else { continue };
        let mut cells: Vec<String> = Vec::new();
        for cell in CELL.captures_iter(body.as_str()) {
            let attrs = &cell[1];
            let col = attr(attrs, "r")
                .and_then(|r| column_index(&r))
                .unwrap_or(cells.len());
            if col >= MAX_READ_COLUMNS {
                continue;
            }
            let inner = cell.get(2).map(|m| m.as_str()).unwrap_or("");
            let raw_value = VALUE.captures(inner).map(|v| unescape_xml(&v[1]));
            let value = match attr(attrs, "t").as_deref() {
                Some("s") => raw_value
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => TEXT_RUN
                    .captures_iter(inner)
                    .map(|t| unescape_xml(&t[1]))
                    .collect(),
                Some("b") => match raw_value.as_deref() {
                    Some("1") => "TRUE".to_string(),
                    Some(_) => "FALSE".to_string(),
                    None => String::new(),
                },
                _ => raw_value.unwrap_or_default(),
            };
            if cells.len() <= col {
                cells.resize(col + 1, String::new());
            }
            cells[col] = value;
        }
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        if !cells.is_empty() {
            rows.push(cells);
        }
    }
    rows
}

const XLSX_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

/// A workbook with one worksheet per [`Sheet`], every cell an inline string.
/// An empty list yields one empty sheet named `sheet`.
pub fn write_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>, ConvertError> {
    let fallback = [Sheet {
        name: "sheet".into(),
        rows: Vec::new(),
    }];
    let sheets = if sheets.is_empty() { &fallback[..] } else { sheets };

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook_sheets = String::new();
    let mut workbook_rels = String::new();
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook_sheets.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape_xml(&sheet.name)
        ));
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));

        let mut data = String::new();
        for (r, row) in sheet.rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                data.push_str(&format!(
                    r#"<c r="{}{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    column_name(c),
                    r + 1,
                    escape_xml(value)
                ));
            }
            data.push_str("</row>");
        }
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#
        );
        entries.push((format!("xl/worksheets/sheet{n}.xml"), xml.into_bytes()));
    }
    content_types.push_str("</Types>");

    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{workbook_sheets}</sheets></workbook>"#
    );
    let rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{workbook_rels}</Relationships>"#
    );

    let mut all: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), content_types.into_bytes()),
        ("_rels/.rels".into(), XLSX_ROOT_RELS.as_bytes().to_vec()),
        ("xl/workbook.xml".into(), workbook.into_bytes()),
        ("xl/_rels/workbook.xml.rels".into(), rels.into_bytes()),
    ];
    all.extend(entries);
    write_zip(&all)
}

// ── PPTX ────────────────────────────────────────────────────────────────

static SLIDE_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());
static PPTX_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a:t>([^<]*)</a:t>|<a:br\b[^>]*/>|</a:p>").unwrap());

/// Non-empty paragraphs of every slide, in slide-number order.
pub fn read_pptx_slides(bytes: &[u8]) -> Result<Vec<Vec<String>>, ConvertError> {
    let mut pkg = open(bytes, "pptx")?;
    let mut parts: Vec<(u32, String)> = pkg
        .file_names()
        .filter_map(|name| {
            let n = SLIDE_PART.captures(name)?[1].parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    parts.sort();

    let mut slides = Vec::with_capacity(parts.len());
    for (_, part) in parts {
        let xml = read_part(&mut pkg, &part)?.unwrap_or_default();
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        for caps in PPTX_TOKEN.captures_iter(&xml) {
            if let Some(text) = caps.get(1) {
                current.push_str(&unescape_xml(text.as_str()));
            } else if caps[0].starts_with("<a:br") {
                current.push('\n');
            } else if !current.trim().is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
        slides.push(paragraphs);
    }
    Ok(slides)
}

/// 10in × 7.5in in EMU.
pub const SLIDE_WIDTH_EMU: u64 = 9_144_000;
pub const SLIDE_HEIGHT_EMU: u64 = 6_858_000;

/// One full-slide picture.
#[derive(Debug, Clone)]
pub struct SlideImage {
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Offset and extent (EMU) of a `w × h` picture scaled to fit the slide and
/// centred.
pub fn fit_picture(width_px: u32, height_px: u32) -> (u64, u64, u64, u64) {
    let (w, h) = (width_px.max(1) as f64, height_px.max(1) as f64);
    let scale = (SLIDE_WIDTH_EMU as f64 / w).min(SLIDE_HEIGHT_EMU as f64 / h);
    let cx = (w * scale).round() as u64;
    let cy = (h * scale).round() as u64;
    let x = SLIDE_WIDTH_EMU.saturating_sub(cx) / 2;
    let y = SLIDE_HEIGHT_EMU.saturating_sub(cy) / 2;
    (x, y, cx.min(SLIDE_WIDTH_EMU), cy.min(SLIDE_HEIGHT_EMU))
}

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const EMPTY_TREE: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F497D"/></a:dk2><a:lt2><a:srgbClr val="EEECE1"/></a:lt2><a:accent1><a:srgbClr val="4F81BD"/></a:accent1><a:accent2><a:srgbClr val="C0504D"/></a:accent2><a:accent3><a:srgbClr val="9BBB59"/></a:accent3><a:accent4><a:srgbClr val="8064A2"/></a:accent4><a:accent5><a:srgbClr val="4BACC6"/></a:accent5><a:accent6><a:srgbClr val="F79646"/></a:accent6><a:hlink><a:srgbClr val="0000FF"/></a:hlink><a:folHlink><a:srgbClr val="800080"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="25400"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="38100"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#;

fn rels(items: &[(&str, &str, String)]) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in items {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{REL_NS}/{kind}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml.into_bytes()
}

/// A 4:3 presentation with one centred full-slide picture per image.
pub fn write_pptx(slides: &[SlideImage]) -> Result<Vec<u8>, ConvertError> {
    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#,
    );
    let mut slide_ids = String::new();
    let mut presentation_rels = vec![
        ("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string()),
        ("rId2".to_string(), "theme", "theme/theme1.xml".to_string()),
    ];

    for (i, slide) in slides.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        ));
        slide_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 2));
        presentation_rels.push((format!("rId{}", n + 2), "slide", format!("slides/slide{n}.xml")));

        let (x, y, cx, cy) = fit_picture(slide.width_px, slide.height_px);
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld {NS}><p:cSld><p:spTree>{EMPTY_TREE}<p:pic><p:nvPicPr><p:cNvPr id="2" name="Page {n}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        );
        entries.push((format!("ppt/slides/slide{n}.xml"), xml.into_bytes()));
        entries.push((
            format!("ppt/slides/_rels/slide{n}.xml.rels"),
            rels(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml".into()),
                ("rId2", "image", format!("../media/image{n}.png")),
            ]),
        ));
        entries.push((format!("ppt/media/image{n}.png"), slide.png.clone()));
    }
    content_types.push_str("</Types>");

    let presentation = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation {NS}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}" type="screen4x3"/><p:notesSz cx="{SLIDE_HEIGHT_EMU}" cy="{SLIDE_WIDTH_EMU}"/></p:presentation>"#
    );
    let master = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster {NS}><p:cSld><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    );
    let layout = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout {NS} type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{EMPTY_TREE}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    );

    let pres_rels: Vec<(&str, &str, String)> = presentation_rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.clone()))
        .collect();

    let mut all: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".into(), content_types.into_bytes()),
        (
            "_rels/.rels".into(),
            rels(&[("rId1", "officeDocument", "ppt/presentation.xml".into())]),
        ),
        ("ppt/presentation.xml".into(), presentation.into_bytes()),
        ("ppt/_rels/presentation.xml.rels".into(), rels(&pres_rels)),
        ("ppt/slideMasters/slideMaster1.xml".into(), master.into_bytes()),
        (
            "ppt/slideMasters/_rels/slideMaster1.xml.rels".into(),
            rels(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml".into()),
                ("rId2", "theme", "../theme/theme1.xml".into()),
            ]),
        ),
        ("ppt/slideLayouts/slideLayout1.xml".into(), layout.into_bytes()),
        (
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels".into(),
            rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml".into())]),
        ),
        ("ppt/theme/theme1.xml".into(), THEME.as_bytes().to_vec()),
    ];
    all.extend(entries);
    write_zip(&all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn docx_roundtrip() {
        let pages = vec![
            vec!["Hello & <world>".to_string(), String::new()],
            vec!["second page".to_string()],
        ];
        let bytes = write_docx(&pages).unwrap();
        let paragraphs = read_docx_paragraphs(&bytes).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Hello & <world>", "", "\n", "second page"]
        );
    }

    #[test]
    fn docx_tabs_breaks_and_tab_stops() {
        let xml = r#"<w:document><w:body><w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>a</w:t><w:tab/><w:t xml:space="preserve">b </w:t><w:br/><w:t>c&amp;d</w:t></w:r></w:p><w:p/></w:body></w:document>"#;
        let bytes = write_zip(&[("word/document.xml", xml.as_bytes().to_vec())]).unwrap();
        assert_eq!(read_docx_paragraphs(&bytes).unwrap(), vec!["a\tb \nc&d", ""]);
    }

    #[test]
    fn not_a_zip_is_malformed() {
        let err = read_docx_paragraphs(b"plain text").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedInput);
    }

    #[test]
    fn xlsx_roundtrip() {
        let sheets = vec![
            Sheet {
                name: "page_1_table_1".into(),
                rows: vec![
                    vec!["Name".into(), "Qty".into()],
                    vec!["Apples & pears".into(), "".into(), "3".into()],
                ],
            },
            Sheet {
                name: "empty".into(),
                rows: vec![],
            },
        ];
        let bytes = write_xlsx(&sheets).unwrap();
        let read = read_xlsx(&bytes).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].name, "page_1_table_1");
        assert_eq!(read[0].rows[0], vec!["Name", "Qty"]);
        assert_eq!(read[0].rows[1], vec!["Apples & pears", "", "3"]);
        assert!(read[1].rows.is_empty());
    }

    #[test]
    fn xlsx_shared_strings_and_types() {
        let workbook = r#"<workbook xmlns:r="x"><sheets><sheet name="Data" sheetId="1" r:id="rId7"/></sheets></workbook>"#;
        let rels = r#"<Relationships><Relationship Id="rId7" Type="t" Target="worksheets/data.xml"/></Relationships>"#;
        let shared = r#"<sst><si><t>alpha</t></si><si><r><t>be</t></r><r><t xml:space="preserve">ta</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>1</v></c><c r="C1"><v>4.5</v></c><c r="D1" t="b"><v>1</v></c></row><row r="2"/><row r="3"><c r="B3" t="s"><v>0</v></c></row></sheetData></worksheet>"#;
        let bytes = write_zip(&[
            ("xl/workbook.xml", workbook.as_bytes().to_vec()),
            ("xl/_rels/workbook.xml.rels", rels.as_bytes().to_vec()),
            ("xl/sharedStrings.xml", shared.as_bytes().to_vec()),
            ("xl/worksheets/data.xml", sheet.as_bytes().to_vec()),
        ])
        .unwrap();
        let sheets = read_xlsx(&bytes).unwrap();
        assert_eq!(sheets[0].name, "Data");
        assert_eq!(sheets[0].rows, vec![vec!["beta", "", "4.5", "TRUE"], vec!["", "alpha"]]);
    }

    #[test]
    fn column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_index("AA12"), Some(26));
        assert_eq!(column_index("c3"), Some(2));
    }

    #[test]
    fn pptx_slide_text() {
        let s1 = r#"<p:sld><a:p><a:r><a:t>Title</a:t></a:r></a:p><a:p><a:r><a:t>a</a:t></a:r><a:br/><a:r><a:t>b</a:t></a:r></a:p><a:p></a:p></p:sld>"#;
        let s2 = r#"<p:sld><a:p><a:r><a:t>Second</a:t></a:r></a:p></p:sld>"#;
        let bytes = write_zip(&[
            ("ppt/slides/slide10.xml", s2.as_bytes().to_vec()),
            ("ppt/slides/slide2.xml", s1.as_bytes().to_vec()),
        ])
        .unwrap();
        let slides = read_pptx_slides(&bytes).unwrap();
        assert_eq!(
            slides,
            vec![vec!["Title".to_string(), "a\nb".to_string()], vec!["Second".to_string()]],
        );
    }

    #[test]
    fn pptx_package_has_every_slide() {
        let slides = vec![
            SlideImage { png: vec![1], width_px: 800, height_px: 600 },
            SlideImage { png: vec![2], width_px: 600, height_px: 800 },
        ];
        let names = zip_names(&write_pptx(&slides).unwrap());
        for part in [
            "ppt/presentation.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
            "ppt/media/image2.png",
            "ppt/theme/theme1.xml",
        ] {
            assert!(names.iter().any(|n| n == part), "missing {part}");
        }
    }

    #[test]
    fn pictures_fit_and_centre() {
        // 4:3 fills the slide exactly.
        assert_eq!(fit_picture(800, 600), (0, 0, SLIDE_WIDTH_EMU, SLIDE_HEIGHT_EMU));
        // Portrait is pillar-boxed.
        let (x, y, cx, cy) = fit_picture(600, 800);
        assert_eq!(y, 0);
        assert_eq!(cy, SLIDE_HEIGHT_EMU);
        assert_eq!(x, (SLIDE_WIDTH_EMU - cx) / 2);
    }

    #[test]
    fn ole_detection() {
        assert!(is_ole(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0]));
        assert!(!is_ole(b"PK\x03\x04"));
    }
}
