//! Per-job private directory.
//!
//! ```text
//! docconv-<label>-XXXXXX/
//!  ├─ input/               uploaded source files (input_0.docx, …)
//!  ├─ scratch/<strategy>/  intermediates of one strategy attempt
//!  └─ profile/             HOME and office-suite user profile
//! ```
//!
//! ## Why one directory per job?
//!
//! Office suites keep a lock on their user profile and external tools
//! write next to their input. Two jobs sharing a directory would corrupt
//! each other, so every job owns a fresh tree and hands `profile/` to its
//! child processes as `HOME`. The directory is removed when the
//! [`Workspace`] is released or dropped, including on panic.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

pub struct Workspace {
    dir: TempDir,
    input: PathBuf,
    profile: PathBuf,
}

impl Workspace {
    /// Create a uniquely named workspace under `root` (system temp dir when
    /// `None`).
    pub fn acquire(root: Option<&Path>, job_label: &str) -> Result<Self, ConvertError> {
        let prefix = format!("docconv-{}-", sanitize_label(job_label));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)
                    .map_err(|e| ConvertError::io("creating temp root", e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| ConvertError::io("creating job workspace", e))?;

        let input = dir.path().join("input");
        let profile = dir.path().join("profile");
        for sub in [&input, &profile, &dir.path().join("scratch")] {
            std::fs::create_dir_all(sub)
                .map_err(|e| ConvertError::io("preparing job workspace", e))?;
        }
        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir, input, profile })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_dir(&self) -> &Path {
        &self.input
    }

    /// Isolated `HOME` / office profile for child processes of this job.
    pub fn profile_dir(&self) -> &Path {
        &self.profile
    }

    /// Write source number `index` as `input/input_<index>.<ext>`.
    ///
    /// The uploaded filename is never used on disk.
    pub fn write_input(
        &self,
        index: usize,
        ext: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, ConvertError> {
        let ext: String = ext
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect();
        let name = if ext.is_empty() {
            format!("input_{index}")
        } else {
            format!("input_{index}.{ext}")
        };
        let path = self.input.join(name);
        std::fs::write(&path, bytes).map_err(|e| ConvertError::io("writing job input", e))?;
        Ok(path)
    }

    /// Fresh scratch directory for one strategy attempt. Leftovers of an
    /// earlier attempt with the same name are removed first.
    pub fn scratch(&self, name: &str) -> Result<PathBuf, ConvertError> {
        let path = self.dir.path().join("scratch").join(sanitize_label(name));
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .map_err(|e| ConvertError::io("clearing scratch directory", e))?;
        }
        std::fs::create_dir_all(&path)
            .map_err(|e| ConvertError::io("creating scratch directory", e))?;
        Ok(path)
    }

    /// Delete the workspace, or keep it on disk and return its path when
    /// `preserve` is set.
    pub fn release(self, preserve: bool) -> Option<PathBuf> {
        if preserve {
            let kept = self.dir.keep();
            warn!("Preserved workspace for diagnosis: {}", kept.display());
            return Some(kept);
        }
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove workspace {}: {}", path.display(), e);
        }
        None
    }
}

/// Reduce a job label to characters safe in a directory name.
fn sanitize_label(label: &str) -> String {
    let s: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(32)
        .collect();
    if s.is_empty() {
        "job".to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(Some(root.path()), "report.docx").unwrap();
        let base = ws.path().to_path_buf();
        assert!(base
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("docconv-report_docx-"));
        assert!(ws.input_dir().is_dir());
        assert!(ws.profile_dir().is_dir());

        let input = ws.write_input(0, "docx", b"abc").unwrap();
        assert_eq!(input.file_name().unwrap(), "input_0.docx");

        let scratch = ws.scratch("office-suite").unwrap();
        std::fs::write(scratch.join("leftover"), b"x").unwrap();
        let again = ws.scratch("office-suite").unwrap();
        assert!(!again.join("leftover").exists());

        assert!(ws.release(false).is_none());
        assert!(!base.exists());
    }

    #[test]
    fn preserved_workspace_survives() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::acquire(Some(root.path()), "x").unwrap();
        let kept = ws.release(true).unwrap();
        assert!(kept.is_dir());
        std::fs::remove_dir_all(kept).unwrap();
    }

    #[test]
    fn drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let base = {
            let ws = Workspace::acquire(Some(root.path()), "x").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!base.exists());
    }

    #[test]
    fn concurrent_workspaces_are_distinct() {
        let a = Workspace::acquire(None, "same").unwrap();
        let b = Workspace::acquire(None, "same").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(sanitize_label("../../etc"), "______etc");
        assert_eq!(sanitize_label(""), "job");
    }
}
