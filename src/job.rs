//! The unit of work handed to the dispatcher.

use crate::config::ConversionOptions;
use crate::error::ConvertError;
use crate::format::{SourceFormat, TargetFormat};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl SourceFile {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    /// Read a file from disk, keeping only its final path component as name.
    pub fn from_path(path: &std::path::Path) -> Result<Self, ConvertError> {
        let bytes = std::fs::read(path)
            .map_err(|e| ConvertError::io(format!("reading {}", path.display()), e))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        Ok(Self { bytes, filename })
    }

    /// Lower-cased extension of the uploaded name, if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']))
    }
}

/// A validated conversion request. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub sources: Vec<SourceFile>,
    pub source_format: SourceFormat,
    pub target_format: TargetFormat,
    pub options: ConversionOptions,
}

impl ConversionJob {
    /// Single-source job with the default options for `target_format`.
    pub fn new(
        source: SourceFile,
        source_format: SourceFormat,
        target_format: TargetFormat,
    ) -> Self {
        Self {
            sources: vec![source],
            source_format,
            target_format,
            options: ConversionOptions::for_target(target_format),
        }
    }

    /// Multi-image job producing one PDF.
    pub fn images(sources: Vec<SourceFile>) -> Self {
        Self {
            sources,
            source_format: SourceFormat::Image,
            target_format: TargetFormat::Pdf,
            options: ConversionOptions::for_target(TargetFormat::Pdf),
        }
    }

    /// Infer the source format from the filename extension.
    pub fn from_filename(
        source: SourceFile,
        target_format: TargetFormat,
    ) -> Result<Self, ConvertError> {
        let source_format = SourceFormat::from_filename(&source.filename).ok_or_else(|| {
            ConvertError::UnsupportedConversion {
                source_format: source.extension().unwrap_or_else(|| "unknown".into()),
                target_format: target_format.to_string(),
            }
        })?;
        Ok(Self::new(source, source_format, target_format))
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }

    /// The first source. Every job has at least one once validated.
    pub fn primary(&self) -> Option<&SourceFile> {
        self.sources.first()
    }

    /// Human-readable label used in logs and progress events.
    pub fn label(&self) -> String {
        match self.sources.as_slice() {
            [] => "<empty>".to_string(),
            [one] => one.filename.clone(),
            [first, rest @ ..] => format!("{} (+{} more)", first.filename, rest.len()),
        }
    }

    /// Reject jobs that no strategy could ever handle: no sources, zero-byte
    /// sources, or several sources for a single-document conversion.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if self.sources.is_empty() {
            return Err(ConvertError::EmptyInput {
                detail: "no source files".into(),
            });
        }
        if self.source_format != SourceFormat::Image && self.sources.len() > 1 {
            return Err(ConvertError::InvalidConfig(format!(
                "{} jobs take exactly one source, got {}",
                self.source_format,
                self.sources.len()
            )));
        }
        // Image jobs skip individual empty files later; all-empty is still empty.
        let all_empty = self.sources.iter().all(|s| s.bytes.is_empty());
        let any_empty = self.sources.iter().any(|s| s.bytes.is_empty());
        if all_empty || (self.source_format != SourceFormat::Image && any_empty) {
            return Err(ConvertError::EmptyInput {
                detail: format!("'{}' has 0 bytes", self.label()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn empty_single_source_is_rejected() {
        let job = ConversionJob::new(
            SourceFile::new(Vec::new(), "a.txt"),
            SourceFormat::Txt,
            TargetFormat::Pdf,
        );
        assert_eq!(job.validate().unwrap_err().kind(), ErrorKind::EmptyInput);
    }

    #[test]
    fn image_job_tolerates_some_empty_sources() {
        let job = ConversionJob::images(vec![
            SourceFile::new(Vec::new(), "a.png"),
            SourceFile::new(vec![1, 2, 3], "b.png"),
        ]);
        assert!(job.validate().is_ok());
        assert_eq!(job.label(), "a.png (+1 more)");

        let all_empty = ConversionJob::images(vec![SourceFile::new(Vec::new(), "a.png")]);
        assert_eq!(all_empty.validate().unwrap_err().kind(), ErrorKind::EmptyInput);
        assert_eq!(
            ConversionJob::images(Vec::new()).validate().unwrap_err().kind(),
            ErrorKind::EmptyInput
        );
    }

    #[test]
    fn multi_source_document_job_is_invalid() {
        let mut job = ConversionJob::new(
            SourceFile::new(b"x".to_vec(), "a.pdf"),
            SourceFormat::Pdf,
            TargetFormat::Txt,
        );
        job.sources.push(SourceFile::new(b"y".to_vec(), "b.pdf"));
        assert_eq!(job.validate().unwrap_err().kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn infers_format_from_name() {
        let job = ConversionJob::from_filename(
            SourceFile::new(b"x".to_vec(), "Deck.PPT"),
            TargetFormat::Pdf,
        ).unwrap();
        assert_eq!(job.source_format, SourceFormat::Pptx);
        let err = ConversionJob::from_filename(
            SourceFile::new(b"x".to_vec(), "a.exe"),
            TargetFormat::Pdf,
        ).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
    }
}
