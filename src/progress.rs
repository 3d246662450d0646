//! Progress-callback trait for per-job conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to be told
//! when a job starts, when each fallback strategy is tried, and how the job
//! ended.
//!
//! # Why callbacks instead of channels?
//!
//! A callback is the smallest integration point. Hosts forward the events
//! wherever they like (a progress bar, a log, a job table) and the library
//! stays unaware of how they communicate. Jobs run in parallel on the
//! blocking pool, so the trait is `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use docconv::{ConversionProgressCallback, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for FallbackCounter {
//!     fn on_strategy_failed(&self, _job: &str, strategy: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{strategy} failed: {error}");
//!     }
//! }
//!
//! let counter = Arc::new(FallbackCounter { failed: AtomicUsize::new(0) });
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the dispatcher as a job moves through its strategy chain.
///
/// All methods default to no-ops. `job` is the label of the job (its source
/// filename), which lets one callback serve many concurrent jobs.
///
/// # Thread safety
///
/// Several jobs may report at once from different blocking threads.
/// Protect shared mutable state with `Mutex` or atomics.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the chain for the job is resolved.
    ///
    /// # Arguments
    /// * `job`       : job label
    /// * `strategies`: number of strategies in the chain
    fn on_job_start(&self, job: &str, strategies: usize) {
        let _ = (job, strategies);
    }

    /// Called just before a strategy runs.
    fn on_strategy_start(&self, job: &str, strategy: &str) {
        let _ = (job, strategy);
    }

    /// Called when a strategy fails or is skipped for a missing backend.
    fn on_strategy_failed(&self, job: &str, strategy: &str, error: &str) {
        let _ = (job, strategy, error);
    }

    /// Called when the job produced output.
    ///
    /// # Arguments
    /// * `strategy`: the strategy that succeeded
    /// * `bytes`   : size of the produced file
    fn on_job_complete(&self, job: &str, strategy: &str, bytes: usize) {
        let _ = (job, strategy, bytes);
    }

    /// Called when the job ended without output.
    fn on_job_failed(&self, job: &str, error: &str) {
        let _ = (job, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        strategies: AtomicUsize,
        failures: AtomicUsize,
        completed_bytes: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_job_start(&self, _job: &str, strategies: usize) {
            self.strategies.store(strategies, Ordering::SeqCst);
        }

        fn on_strategy_failed(&self, _job: &str, _strategy: &str, _error: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_job_complete(&self, _job: &str, _strategy: &str, bytes: usize) {
            self.completed_bytes.store(bytes, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start("a.docx", 2);
        cb.on_strategy_start("a.docx", "office-suite");
        cb.on_strategy_failed("a.docx", "office-suite", "soffice missing");
        cb.on_job_complete("a.docx", "docx-native-render", 1024);
        cb.on_job_failed("b.docx", "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_job_start("deck.pptx", 2);
        tracker.on_strategy_failed("deck.pptx", "office-suite", "timeout");
        tracker.on_job_complete("deck.pptx", "slide-text-render", 2048);

        assert_eq!(tracker.strategies.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_bytes.load(Ordering::SeqCst), 2048);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_job_start("x.txt", 1);
        cb.on_job_complete("x.txt", "txt-render", 512);
    }
}
