//! Job dispatch: the single entry point every conversion goes through.
//!
//! ## Why one dispatcher?
//!
//! Hosts (a web handler, the CLI, a batch worker) all need the same steps
//! in the same order, and the order matters for the guarantees callers
//! rely on:
//!
//! ```text
//! job
//!  ├─ 1. Validate    empty input rejected before any backend is touched
//!  ├─ 2. Resolve     (source, target) → strategy chain, or Unsupported
//!  ├─ 3. Workspace   private temp dir + office profile per job
//!  ├─ 4. Inputs      source bytes written as input_<i>.<ext>
//!  ├─ 5. Chain       strategies tried in priority order
//!  ├─ 6. Name        <stem>.<ext>, images.pdf for image jobs
//!  └─ 7. Release     workspace deleted (kept on failure in diagnostic mode)
//! ```
//!
//! Capabilities are detected once in [`Dispatcher::new`], so a missing tool
//! costs nothing per job. The dispatcher is cheap to clone and safe to share
//! across threads; each job owns its workspace and nothing else is mutable.

use crate::capabilities::Capabilities;
use crate::config::ServiceConfig;
use crate::error::{ConversionFailure, ConvertError};
use crate::format::{file_stem, SourceFormat};
use crate::job::ConversionJob;
use crate::output::{ConversionOutput, ConversionResult, ConversionStats};
use crate::process::ProcessRunner;
use crate::strategy::{ChainSuccess, StrategyContext, StrategyTable};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

struct Inner {
    config: ServiceConfig,
    table: StrategyTable,
    runner: ProcessRunner,
}

/// Converts jobs using the strategies this host can run.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("capabilities", self.inner.table.capabilities())
            .finish()
    }
}

impl Dispatcher {
    /// Detect installed tools and build the strategy table.
    pub fn new(config: ServiceConfig) -> Self {
        let caps = Capabilities::detect(&config);
        Self::with_capabilities(config, caps)
    }

    /// Use the given capabilities instead of probing the host.
    pub fn with_capabilities(config: ServiceConfig, caps: Capabilities) -> Self {
        let table = StrategyTable::new(&config, &caps);
        Self {
            inner: Arc::new(Inner {
                config,
                table,
                runner: ProcessRunner::new(),
            }),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.inner.table.capabilities()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Run one job to completion on the current thread.
    ///
    /// Blocks for as long as the slowest external tool may take; call
    /// [`Dispatcher::convert_async`] from async code.
    pub fn convert(&self, job: &ConversionJob) -> ConversionResult {
        let start = Instant::now();
        let label = job.label();
        let progress = self.inner.config.progress_callback.as_ref();
        info!(
            "[{}] converting {} → {}",
            label, job.source_format, job.target_format
        );

        let result = self.run_job(job, &label, start);
        match &result {
            Ok(out) => {
                info!(
                    "[{}] done via {} in {}ms ({} bytes)",
                    label,
                    out.stats.strategy,
                    out.stats.duration_ms,
                    out.bytes.len()
                );
                if let Some(cb) = progress {
                    cb.on_job_complete(&label, &out.stats.strategy, out.bytes.len());
                }
            }
            Err(failure) => {
                error!("[{}] failed: {}", label, failure.detail);
                if let Some(cb) = progress {
                    cb.on_job_failed(&label, &failure.detail);
                }
            }
        }
        result
    }

    /// [`Dispatcher::convert`] on tokio's blocking pool.
    pub async fn convert_async(&self, job: ConversionJob) -> ConversionResult {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.convert(&job))
            .await
            .unwrap_or_else(|e| {
                Err(ConversionFailure::from_error(&ConvertError::Internal(format!(
                    "conversion task panicked: {e}"
                ))))
            })
    }

    fn run_job(&self, job: &ConversionJob, label: &str, start: Instant) -> ConversionResult {
        let config = &self.inner.config;

        job.validate()?;
        let chain = self
            .inner
            .table
            .resolve(job.source_format, job.target_format, &job.options)?;
        debug!("[{}] chain: {:?}", label, chain.names());
        if let Some(cb) = &config.progress_callback {
            cb.on_job_start(label, chain.len());
        }

        let ws = Workspace::acquire(config.temp_root.as_deref(), label)?;
        let outcome = write_inputs(&ws, job).and_then(|inputs| {
            let ctx = StrategyContext {
                config,
                runner: &self.inner.runner,
                inputs: &inputs,
            };
            chain.run(job, &ws, &ctx, config.progress_callback.as_ref())
        });

        let preserve = config.diagnostic_mode && outcome.is_err();
        let kept = ws.release(preserve);

        match outcome {
            Ok(success) => Ok(finish(job, success, start)),
            Err(err) => {
                let failure = ConversionFailure::from_error(&err);
                Err(match kept {
                    Some(path) => failure.with_diagnostic_path(path),
                    None => failure,
                })
            }
        }
    }
}

/// Write every source into the workspace, keeping its own extension when
/// it has a sane one (`.doc` and `.docx` need different import filters).
fn write_inputs(ws: &Workspace, job: &ConversionJob) -> Result<Vec<PathBuf>, ConvertError> {
    job.sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let ext = source
                .extension()
                .filter(|e| {
                    !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric())
                })
                .unwrap_or_else(|| job.source_format.default_extension().to_string());
            ws.write_input(i, &ext, &source.bytes)
        })
        .collect()
}

/// Download name of the output.
pub fn output_filename(job: &ConversionJob, extension: &str) -> String {
    if job.source_format == SourceFormat::Image {
        return format!("images.{extension}");
    }
    let stem = job
        .primary()
        .map(|s| file_stem(&s.filename))
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}.{extension}")
}

fn finish(job: &ConversionJob, success: ChainSuccess, start: Instant) -> ConversionOutput {
    let ChainSuccess {
        output,
        strategy,
        attempts,
    } = success;
    ConversionOutput {
        filename: output_filename(job, output.extension),
        content_type: output.content_type.to_string(),
        stats: ConversionStats {
            strategy: strategy.to_string(),
            attempts,
            skipped_inputs: output.skipped_inputs,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        bytes: output.bytes,
    }
}
