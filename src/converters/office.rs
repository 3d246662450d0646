//! Conversions delegated to a headless office suite (LibreOffice `soffice`).
//!
//! ## Why a profile per job?
//!
//! `soffice` locks its user profile. Two conversions sharing one profile
//! either block each other or fail outright, so every invocation points
//! `-env:UserInstallation` at the job workspace's private profile directory
//! and runs with `HOME` there too.
//!
//! The suite writes `<input stem>.<ext>` into `--outdir`. Some filters pick
//! a different name, so when the expected file is missing any `*.<ext>` in
//! the output directory is accepted.

use super::read_input;
use crate::capabilities::Tool;
use crate::error::ConvertError;
use crate::format::TargetFormat;
use crate::job::ConversionJob;
use crate::process::ProcessSpec;
use crate::strategy::{Strategy, StrategyContext, StrategyOutput};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub struct OfficeSuiteStrategy {
    binary: String,
    filter: &'static str,
    infilter: Option<&'static str>,
    extension: &'static str,
    timeout: Duration,
}

impl OfficeSuiteStrategy {
    /// `filter` is the `--convert-to` argument (e.g. `pdf:writer_pdf_Export`),
    /// `extension` the file extension the suite will write.
    pub fn new(
        binary: String,
        filter: &'static str,
        infilter: Option<&'static str>,
        extension: &'static str,
        timeout: Duration,
    ) -> Self {
        Self {
            binary,
            filter,
            infilter,
            extension,
            timeout,
        }
    }

    /// Full argument list for one conversion.
    pub fn command_args(&self, input: &Path, outdir: &Path, profile: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "--headless",
            "--nologo",
            "--nodefault",
            "--norestore",
            "--invisible",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if let Some(infilter) = self.infilter {
            args.push(format!("--infilter={infilter}"));
        }
        args.push("--convert-to".into());
        args.push(self.filter.into());
        args.push("--outdir".into());
        args.push(outdir.to_string_lossy().into_owned());
        args.push(input.to_string_lossy().into_owned());
        args.push(format!("-env:UserInstallation={}", profile_url(profile)));
        args
    }

    fn target(&self) -> TargetFormat {
        match self.extension {
            "docx" => TargetFormat::Docx,
            _ => TargetFormat::Pdf,
        }
    }
}

/// `file://` URL of a local directory, forward slashes on every platform.
pub fn profile_url(dir: &Path) -> String {
    let path = dir.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
    }
}

/// `<stem>.<ext>` in `dir`, else the first `*.<ext>` by name.
pub fn discover_output(dir: &Path, stem: &str, extension: &str) -> Option<PathBuf> {
    let expected = dir.join(format!("{stem}.{extension}"));
    if expected.is_file() {
        return Some(expected);
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

impl Strategy for OfficeSuiteStrategy {
    fn name(&self) -> &'static str {
        "office-suite"
    }

    fn requires(&self) -> &'static [Tool] {
        &[Tool::OfficeSuite]
    }

    fn run(
        &self,
        _job: &ConversionJob,
        ws: &Workspace,
        ctx: &StrategyContext<'_>,
    ) -> Result<StrategyOutput, ConvertError> {
        let input = ctx.primary_input()?;
        let outdir = ws.scratch(self.name())?;
        let profile = ws.profile_dir();

        let spec = ProcessSpec::new(self.binary.clone(), &outdir, self.timeout)
            .args(self.command_args(input, &outdir, profile))
            .home(profile);
        let out = ctx.runner.run(&spec)?;
        debug!("soffice stdout: {}", out.stdout_lossy().trim());
        debug!("soffice stderr: {}", out.stderr_lossy().trim());
        if !out.success() {
            let code = out.exit_code;
            return Err(out.into_failure(
                &self.binary,
                format!("conversion failed (exit {code:?})"),
            ));
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(produced) = discover_output(&outdir, &stem, self.extension) else {
            let detail = format!("no .{} output produced", self.extension);
            return Err(out.into_failure(&self.binary, detail));
        };
        debug!("soffice wrote {}", produced.display());
        Ok(StrategyOutput::new(read_input(&produced)?, self.target()))
    }
}
