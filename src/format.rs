//! Source/target formats, MIME types and output file naming.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_TXT: &str = "text/plain; charset=utf-8";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_ZIP: &str = "application/zip";

const MB: u64 = 1024 * 1024;

/// Format family of an uploaded file. Legacy binary siblings (`.doc`,
/// `.xls`, `.ppt`) share the family of their OOXML counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Txt,
    Pptx,
    Xlsx,
    Docx,
    Image,
    Pdf,
}

impl SourceFormat {
    /// Map a file extension (case-insensitive, with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(SourceFormat::Txt),
            "pptx" | "ppt" => Some(SourceFormat::Pptx),
            "xlsx" | "xls" => Some(SourceFormat::Xlsx),
            "docx" | "doc" => Some(SourceFormat::Docx),
            "png" | "jpg" | "jpeg" | "bmp" => Some(SourceFormat::Image),
            "pdf" => Some(SourceFormat::Pdf),
            _ => None,
        }
    }

    /// Guess the format from a filename's extension.
    pub fn from_filename(name: &str) -> Option<Self> {
        name.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    /// Maximum upload size the validation layer should accept.
    ///
    /// The core never enforces this; it is published here so every caller
    /// applies the same limits.
    pub fn max_upload_bytes(self) -> u64 {
        match self {
            SourceFormat::Txt => 20 * MB,
            SourceFormat::Pptx => 100 * MB,
            SourceFormat::Docx | SourceFormat::Xlsx | SourceFormat::Pdf => 50 * MB,
            SourceFormat::Image => 50 * MB,
        }
    }

    /// Extension used when the source is written into the workspace.
    pub fn default_extension(self) -> &'static str {
        match self {
            SourceFormat::Txt => "txt",
            SourceFormat::Pptx => "pptx",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Docx => "docx",
            SourceFormat::Image => "png",
            SourceFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceFormat::Txt => "txt",
            SourceFormat::Pptx => "pptx",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Docx => "docx",
            SourceFormat::Image => "image",
            SourceFormat::Pdf => "pdf",
        };
        f.write_str(s)
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("image") || s.eq_ignore_ascii_case("images") {
            return Ok(SourceFormat::Image);
        }
        Self::from_extension(s).ok_or_else(|| format!("unknown source format '{s}'"))
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Txt,
    Jpg,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Docx => "docx",
            TargetFormat::Pptx => "pptx",
            TargetFormat::Xlsx => "xlsx",
            TargetFormat::Txt => "txt",
            TargetFormat::Jpg => "jpg",
        }
    }

    /// MIME type of the single-file output. PDF→JPG may instead produce a
    /// ZIP bundle ([`MIME_ZIP`]).
    pub fn content_type(self) -> &'static str {
        match self {
            TargetFormat::Pdf => MIME_PDF,
            TargetFormat::Docx => MIME_DOCX,
            TargetFormat::Pptx => MIME_PPTX,
            TargetFormat::Xlsx => MIME_XLSX,
            TargetFormat::Txt => MIME_TXT,
            TargetFormat::Jpg => MIME_JPEG,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(TargetFormat::Pdf),
            "docx" | "word" => Ok(TargetFormat::Docx),
            "pptx" | "powerpoint" => Ok(TargetFormat::Pptx),
            "xlsx" | "excel" => Ok(TargetFormat::Xlsx),
            "txt" | "text" => Ok(TargetFormat::Txt),
            "jpg" | "jpeg" => Ok(TargetFormat::Jpg),
            other => Err(format!("unknown target format '{other}'")),
        }
    }
}

/// Strip the last extension from an uploaded filename, ignoring any
/// directory components a client may have sent. Falls back to `"output"`.
pub fn file_stem(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        Some(_) => "",
        None => base,
    };
    if stem.is_empty() {
        "output".to_string()
    } else {
        stem.to_string()
    }
}
