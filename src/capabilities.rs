//! One-shot detection of the external tools the strategies depend on.
//!
//! Detection runs once when the [`crate::convert::Dispatcher`] is built. Its
//! result is handed to the [`crate::strategy::StrategyTable`], so a missing
//! tool is known before any job starts. Strategies that need it are skipped
//! with a recorded `BackendUnavailable` attempt and are never invoked.

use crate::config::ServiceConfig;
use crate::process::resolve_binary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// An external dependency a strategy may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    OfficeSuite,
    Pdftotext,
    Pdftoppm,
    Tesseract,
    Pdfium,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tool::OfficeSuite => "office-suite",
            Tool::Pdftotext => "pdftotext",
            Tool::Pdftoppm => "pdftoppm",
            Tool::Tesseract => "tesseract",
            Tool::Pdfium => "pdfium",
        };
        f.write_str(s)
    }
}

/// Resolved locations of the available tools. `None` means absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub office_suite: Option<PathBuf>,
    pub pdftotext: Option<PathBuf>,
    pub pdftoppm: Option<PathBuf>,
    pub tesseract: Option<PathBuf>,
    pub pdfium: bool,
}

impl Capabilities {
    /// Look up every configured binary and try binding pdfium.
    pub fn detect(config: &ServiceConfig) -> Self {
        let caps = Self {
            office_suite: resolve_binary(&config.office_binary),
            pdftotext: resolve_binary(&config.pdftotext_binary),
            pdftoppm: resolve_binary(&config.pdftoppm_binary),
            tesseract: resolve_binary(&config.tesseract_binary),
            pdfium: crate::pdfium::is_available(config.pdfium_library.as_deref()),
        };
        info!(
            "Capabilities: office={} pdftotext={} pdftoppm={} tesseract={} pdfium={}",
            caps.office_suite.is_some(),
            caps.pdftotext.is_some(),
            caps.pdftoppm.is_some(),
            caps.tesseract.is_some(),
            caps.pdfium
        );
        caps
    }

    /// Nothing installed: only the pure-Rust strategies remain.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn has(&self, tool: Tool) -> bool {
        match tool {
            Tool::OfficeSuite => self.office_suite.is_some(),
            Tool::Pdftotext => self.pdftotext.is_some(),
            Tool::Pdftoppm => self.pdftoppm.is_some(),
            Tool::Tesseract => self.tesseract.is_some(),
            Tool::Pdfium => self.pdfium,
        }
    }

    /// Resolved path of a binary tool. Always `None` for pdfium.
    pub fn path(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::OfficeSuite => self.office_suite.as_ref(),
            Tool::Pdftotext => self.pdftotext.as_ref(),
            Tool::Pdftoppm => self.pdftoppm.as_ref(),
            Tool::Tesseract => self.tesseract.as_ref(),
            Tool::Pdfium => None,
        }
    }

    /// Tools that are absent, for diagnostics.
    pub fn missing(&self) -> Vec<Tool> {
        [
            Tool::OfficeSuite,
            Tool::Pdftotext,
            Tool::Pdftoppm,
            Tool::Tesseract,
            Tool::Pdfium,
        ]
        .into_iter()
        .filter(|t| !self.has(*t))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_has_nothing() {
        let caps = Capabilities::none();
        assert!(!caps.has(Tool::OfficeSuite));
        assert!(!caps.has(Tool::Pdfium));
        assert_eq!(caps.missing().len(), 5);
    }

    #[cfg(unix)]
    #[test]
    fn detection_respects_configured_names() {
        let config = ServiceConfig::builder()
            .office_binary("docconv-missing-soffice")
            .pdftotext_binary("sh")
            .build()
            .unwrap();
        let caps = Capabilities::detect(&config);
        assert!(!caps.has(Tool::OfficeSuite));
        assert!(caps.has(Tool::Pdftotext));
        assert!(caps.path(Tool::Pdftotext).is_some());
        assert!(caps.path(Tool::Pdfium).is_none());
    }
}
