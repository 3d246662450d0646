//! Bounded execution of external programs.
//!
//! Every subprocess the service launches (office suite, poppler tools,
//! tesseract) goes through [`ProcessRunner::run`]:
//!
//! * the binary is resolved first; a missing tool becomes
//!   [`ConvertError::BackendUnavailable`] without anything being spawned,
//! * stdout and stderr are drained on helper threads so a chatty child cannot
//!   block on a full pipe while we wait for it,
//! * the child is polled until the deadline, then its process group is
//!   killed **and reaped** so no zombie outlives the job; the deadline also
//!   covers the pipes, which a backgrounded helper may hold open after the
//!   direct child exits,
//! * `HOME`, `USERPROFILE` and `TMPDIR` point into the job's profile
//!   directory, so concurrent office instances never share a user profile.
//!
//! A non-zero exit status is *not* an error at this layer: callers decide
//! what a failed run means and get stdout/stderr to report it.

use crate::error::ConvertError;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What to run and under which constraints.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Bare name (looked up on `PATH`) or path to the executable.
    pub program: String,
    pub args: Vec<OsString>,
    /// Working directory of the child.
    pub work_dir: PathBuf,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Directory exported as `HOME`/`USERPROFILE`/`TMPDIR`.
    pub home: Option<PathBuf>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(
        program: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            env: Vec::new(),
            home: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home = Some(dir.into());
        self
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn a non-zero exit into [`ConvertError::ProcessFailure`].
    pub fn into_failure(self, program: &str, detail: impl Into<String>) -> ConvertError {
        ConvertError::ProcessFailure {
            program: program.to_string(),
            exit_code: self.exit_code,
            detail: detail.into(),
            stdout: self.stdout_lossy(),
            stderr: self.stderr_lossy(),
        }
    }
}

/// Runs external programs with a hard timeout. Stateless and cheap to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ConvertError> {
        let exe = resolve_binary(&spec.program).ok_or_else(|| {
            ConvertError::unavailable(
                spec.program.clone(),
                "executable not found on PATH".to_string(),
            )
        })?;
        debug!(
            "run {} {:?} timeout={:?}",
            exe.display(),
            spec.args,
            spec.timeout
        );

        let mut cmd = Command::new(&exe);
        cmd.args(&spec.args)
            .current_dir(&spec.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref home) = spec.home {
            cmd.env("HOME", home)
                .env("USERPROFILE", home)
                .env("TMPDIR", home);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }
        #[cfg(unix)]
        {
            // Own process group, so a timeout also reaches helpers such as soffice.bin.
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| ConvertError::ProcessFailure {
            program: spec.program.clone(),
            exit_code: None,
            detail: format!("launch failed: {e}"),
            stdout: String::new(),
            stderr: String::new(),
        })?;

        let (tx, rx) = mpsc::channel();
        spawn_drain(child.stdout.take(), Pipe::Stdout, tx.clone());
        spawn_drain(child.stderr.take(), Pipe::Stderr, tx);
        let deadline = start + spec.timeout;

        loop {
            let polled = child.try_wait().map_err(|e| ConvertError::io("waiting for child", e))?;
            if let Some(status) = polled {
                // A background helper that inherited the pipes keeps them
                // open after the direct child exits; the deadline still holds.
                let Some((stdout, stderr)) = collect_pipes(&rx, deadline) else {
                    warn!(
                        "{} exited but its pipes stayed open past {:?}, killing its group",
                        spec.program, spec.timeout
                    );
                    kill_tree(&mut child);
                    return Err(ConvertError::Timeout {
                        program: spec.program.clone(),
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                };
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!("{} exited with {:?} after {}ms", spec.program, status.code(), elapsed_ms);
                return Ok(ProcessOutput {
                    stdout,
                    stderr,
                    exit_code: status.code(),
                    elapsed_ms,
                });
            }

            if Instant::now() >= deadline {
                warn!("{} timed out after {:?}, killing", spec.program, spec.timeout);
                kill_tree(&mut child);
                // Reap so the child does not linger as a zombie. The drain
                // threads finish on their own once the pipes close.
                let _ = child.wait();
                return Err(ConvertError::Timeout {
                    program: spec.program.clone(),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            }

            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut std::process::Child) {
    let group = format!("-{}", child.id());
    let signalled = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);
    if !signalled {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut std::process::Child) {
    let _ = child.kill();
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn spawn_drain<R: Read + Send + 'static>(
    reader: Option<R>,
    pipe: Pipe,
    tx: Sender<(Pipe, Vec<u8>)>,
) {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        // The receiver is gone when the run already timed out.
        let _ = tx.send((pipe, buf));
    });
}

/// Wait for both drained pipes until `deadline`. `None` if either is still
/// open by then.
fn collect_pipes(rx: &Receiver<(Pipe, Vec<u8>)>, deadline: Instant) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Pipe::Stdout, buf)) => stdout = Some(buf),
            Ok((Pipe::Stderr, buf)) => stderr = Some(buf),
            Err(_) => return None,
        }
    }
    Some((stdout.unwrap_or_default(), stderr.unwrap_or_default()))
}

/// Locate an executable. Names containing a path separator must exist as
/// given; bare names are searched on `PATH`.
pub fn resolve_binary(name: &str) -> Option<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let as_path = Path::new(name);
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return is_executable(as_path).then(|| as_path.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{name}.exe"));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
