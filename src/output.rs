//! Success envelope returned by the dispatcher.

use crate::error::{AttemptFailure, ConversionFailure, ConvertError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of one conversion job.
pub type ConversionResult = Result<ConversionOutput, ConversionFailure>;

/// The converted file plus how it was obtained.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    /// Suggested download name, e.g. `report.pdf` or `slides.zip`.
    pub filename: String,
    pub content_type: String,
    pub stats: ConversionStats,
}

/// How a job was converted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversionStats {
    /// Name of the strategy that produced the output.
    pub strategy: String,
    /// Earlier strategies that failed or were skipped, in chain order.
    pub attempts: Vec<AttemptFailure>,
    /// Inputs dropped because they could not be decoded (image jobs).
    pub skipped_inputs: usize,
    /// Wall-clock time of the whole job.
    pub duration_ms: u64,
}

impl ConversionOutput {
    /// Write the output into `dir` under its suggested filename.
    ///
    /// Uses atomic write (temp file + rename) to prevent partial files.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ConvertError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| ConvertError::io(format!("creating {}", dir.display()), e))?;
        let path = dir.join(&self.filename);
        let tmp_path = dir.join(format!(".{}.tmp", self.filename));
        std::fs::write(&tmp_path, &self.bytes)
            .map_err(|e| ConvertError::io(format!("writing {}", tmp_path.display()), e))?;
        std::fs::rename(&tmp_path, &path)
            .map_err(|e| ConvertError::io(format!("renaming to {}", path.display()), e))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_to_dir_uses_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let out = ConversionOutput {
            bytes: b"%PDF-1.5".to_vec(),
            filename: "notes.pdf".into(),
            content_type: crate::format::MIME_PDF.into(),
            stats: ConversionStats::default(),
        };
        let path = out.write_to_dir(&dir.path().join("nested")).unwrap();
        assert_eq!(path.file_name().unwrap(), "notes.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5");
        assert!(!dir.path().join("nested/.notes.pdf.tmp").exists());
    }

    #[test]
    fn stats_serialize_to_json() {
        let stats = ConversionStats {
            strategy: "txt-render".into(),
            attempts: vec![],
            skipped_inputs: 0,
            duration_ms: 12,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["strategy"], "txt-render");
        assert_eq!(json["duration_ms"], 12);
    }
}
