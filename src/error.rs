//! Error types for the docconv library.
//!
//! Two distinct error types reflect two distinct audiences:
//!
//! * [`ConvertError`]: **Strategy-level**: what a single strategy (or the
//!   chain around it) reports. Most variants are recoverable inside the
//!   [`crate::strategy::StrategyChain`]: the chain moves on to the next
//!   candidate. Only input-class errors and exhaustion leave the chain.
//!
//! * [`ConversionFailure`]: **Terminal**: the envelope handed back to the
//!   caller when a job cannot produce output. It separates a generic,
//!   client-safe `message` from an internal `detail` string meant for logs,
//!   so the HTTP layer never leaks filesystem paths or process environment
//!   details to untrusted clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Everything a strategy, the process runner, or the dispatcher can fail with.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Zero-byte upload (or no sources at all).
    #[error("Input is empty: {detail}")]
    EmptyInput { detail: String },

    /// A library could not decode the source (corrupt document, bad image).
    #[error("Malformed {format} input: {detail}")]
    MalformedInput { format: String, detail: String },

    /// No strategy table entry exists for the requested pair.
    #[error("Conversion from {source_format} to {target_format} is not supported")]
    UnsupportedConversion {
        source_format: String,
        target_format: String,
    },

    // ── Backend errors ────────────────────────────────────────────────────
    /// A required external binary or optional library is not installed.
    #[error("Backend '{backend}' is unavailable: {detail}")]
    BackendUnavailable { backend: String, detail: String },

    /// An external process ran past its allotted time and was killed.
    #[error("'{program}' timed out after {elapsed_ms}ms")]
    Timeout { program: String, elapsed_ms: u64 },

    /// An external process could not be launched, exited non-zero, or
    /// produced no discoverable output.
    #[error("'{program}' failed (exit {exit_code:?}): {detail}")]
    ProcessFailure {
        program: String,
        exit_code: Option<i32>,
        detail: String,
        stdout: String,
        stderr: String,
    },

    /// A strategy ran but its output did not pass the acceptance heuristic.
    #[error("Strategy output rejected: {reason}")]
    Unusable { reason: String },

    /// Every candidate strategy for the pair failed.
    #[error("All {} strategies failed: {}", .attempts.len(), summarize(.attempts))]
    AllStrategiesExhausted { attempts: Vec<AttemptFailure> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Filesystem failure inside the workspace.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// Shorthand for wrapping an `io::Error` with what we were doing.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ConvertError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(format: impl Into<String>, detail: impl fmt::Display) -> Self {
        ConvertError::MalformedInput {
            format: format.into(),
            detail: detail.to_string(),
        }
    }

    pub fn unavailable(backend: impl Into<String>, detail: impl Into<String>) -> Self {
        ConvertError::BackendUnavailable {
            backend: backend.into(),
            detail: detail.into(),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::EmptyInput { .. } => ErrorKind::EmptyInput,
            ConvertError::MalformedInput { .. } => ErrorKind::MalformedInput,
            ConvertError::UnsupportedConversion { .. } => ErrorKind::UnsupportedConversion,
            ConvertError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            ConvertError::Timeout { .. } => ErrorKind::Timeout,
            ConvertError::ProcessFailure { .. } => ErrorKind::ProcessFailure,
            ConvertError::Unusable { .. } => ErrorKind::Unusable,
            ConvertError::AllStrategiesExhausted { .. } => ErrorKind::AllStrategiesExhausted,
            ConvertError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            ConvertError::Io { .. } | ConvertError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the strategy chain must stop instead of trying the next
    /// candidate. Input-class failures mean the source itself is bad, so no
    /// other backend will do better.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConvertError::EmptyInput { .. }
                | ConvertError::MalformedInput { .. }
                | ConvertError::UnsupportedConversion { .. }
                | ConvertError::InvalidConfig(_)
        )
    }
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.strategy, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One failed strategy attempt, kept for [`ConvertError::AllStrategiesExhausted`]
/// and for the per-job stats.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptFailure {
    pub strategy: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Error taxonomy shared by [`ConvertError`] and [`ConversionFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    MalformedInput,
    UnsupportedConversion,
    InvalidConfig,
    BackendUnavailable,
    Timeout,
    ProcessFailure,
    Unusable,
    AllStrategiesExhausted,
    Internal,
}

impl ErrorKind {
    /// `true` when the caller sent something we cannot convert (4xx).
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::EmptyInput
                | ErrorKind::MalformedInput
                | ErrorKind::UnsupportedConversion
                | ErrorKind::InvalidConfig
        )
    }

    /// Suggested HTTP status for the calling layer.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::EmptyInput | ErrorKind::InvalidConfig => 400,
            ErrorKind::UnsupportedConversion => 415,
            ErrorKind::MalformedInput => 422,
            ErrorKind::BackendUnavailable => 503,
            ErrorKind::Timeout => 504,
            _ => 500,
        }
    }

    /// Generic, client-safe message category.
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::EmptyInput => "The uploaded file is empty.",
            ErrorKind::MalformedInput => "The uploaded file could not be read. It may be corrupt.",
            ErrorKind::UnsupportedConversion => "This conversion is not supported.",
            ErrorKind::InvalidConfig => "The conversion options are invalid.",
            ErrorKind::BackendUnavailable => "The conversion service is not available right now.",
            ErrorKind::Timeout => "The conversion took too long and was stopped.",
            _ => "The file could not be converted.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::EmptyInput => "empty_input",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::UnsupportedConversion => "unsupported_conversion",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ProcessFailure => "process_failure",
            ErrorKind::Unusable => "unusable",
            ErrorKind::AllStrategiesExhausted => "all_strategies_exhausted",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Terminal failure envelope returned by the dispatcher.
///
/// `message` is safe to show to end users. `detail` is for logs only and may
/// contain stderr of external tools. `diagnostic_path` is set only when the
/// service runs in diagnostic mode and the workspace was preserved.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct ConversionFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
    pub attempts: Vec<AttemptFailure>,
    pub diagnostic_path: Option<PathBuf>,
}

impl ConversionFailure {
    pub fn from_error(err: &ConvertError) -> Self {
        let kind = err.kind();
        let attempts = match err {
            ConvertError::AllStrategiesExhausted { attempts } => attempts.clone(),
            _ => Vec::new(),
        };
        Self {
            kind,
            message: kind.public_message().to_string(),
            detail: err.to_string(),
            attempts,
            diagnostic_path: None,
        }
    }

    pub fn with_diagnostic_path(mut self, path: PathBuf) -> Self {
        self.diagnostic_path = Some(path);
        self
    }
}

impl From<ConvertError> for ConversionFailure {
    fn from(err: ConvertError) -> Self {
        ConversionFailure::from_error(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_display_lists_every_attempt() {
        let e = ConvertError::AllStrategiesExhausted {
            attempts: vec![
                AttemptFailure {
                    strategy: "office-suite".into(),
                    kind: ErrorKind::BackendUnavailable,
                    message: "soffice not found".into(),
                },
                AttemptFailure {
                    strategy: "docx-native-render".into(),
                    kind: ErrorKind::Unusable,
                    message: "no text".into(),
                },
            ],
        };
        let msg = e.to_string();
        assert!(msg.contains("All 2 strategies"), "got: {msg}");
        assert!(msg.contains("[office-suite] soffice not found"));
        assert!(msg.contains("[docx-native-render] no text"));
    }

    #[test]
    fn input_errors_are_terminal() {
        assert!(ConvertError::EmptyInput { detail: "0 bytes".into() }.is_terminal());
        assert!(ConvertError::malformed("pdf", "bad xref").is_terminal());
        assert!(!ConvertError::unavailable("soffice", "missing").is_terminal());
        assert!(!ConvertError::Timeout {
            program: "soffice".into(),
            elapsed_ms: 10
        }
        .is_terminal());
    }

    #[test]
    fn client_error_mapping() {
        assert!(ErrorKind::EmptyInput.is_client_error());
        assert!(ErrorKind::MalformedInput.is_client_error());
        assert!(!ErrorKind::BackendUnavailable.is_client_error());
        assert_eq!(ErrorKind::Timeout.http_status(), 504);
        assert_eq!(ErrorKind::AllStrategiesExhausted.http_status(), 500);
    }

    #[test]
    fn failure_message_never_contains_detail() {
        let err = ConvertError::ProcessFailure {
            program: "/usr/bin/soffice".into(),
            exit_code: Some(1),
            detail: "no output in /tmp/docconv-abc/scratch".into(),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        let failure = ConversionFailure::from_error(&err);
        assert_eq!(failure.kind, ErrorKind::ProcessFailure);
        assert!(!failure.message.contains("/tmp"));
        assert!(failure.detail.contains("/tmp/docconv-abc"));
        assert!(failure.diagnostic_path.is_none());
    }

    #[test]
    fn exhausted_failure_keeps_attempts() {
        let err = ConvertError::AllStrategiesExhausted {
            attempts: vec![AttemptFailure {
                strategy: "raster-jpg".into(),
                kind: ErrorKind::BackendUnavailable,
                message: "pdfium missing".into(),
            }],
        };
        let failure: ConversionFailure = err.into();
        assert_eq!(failure.attempts.len(), 1);
        assert_eq!(failure.kind, ErrorKind::AllStrategiesExhausted);
    }
}
