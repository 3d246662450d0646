//! Batch conversion: run many jobs with bounded parallelism.
//!
//! ## Why stream?
//!
//! A batch of uploads may take minutes when office conversions are
//! involved. [`convert_stream`] yields each job's result as soon as it
//! finishes, so callers can report progress or write outputs incrementally.
//! Results arrive in completion order and carry the job's index in the
//! input list; [`convert_all`] restores input order for callers that just
//! want everything at once.

use crate::convert::Dispatcher;
use crate::job::ConversionJob;
use crate::output::ConversionResult;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of `(job index, result)` pairs.
pub type JobStream = Pin<Box<dyn Stream<Item = (usize, ConversionResult)> + Send>>;

/// Convert `jobs` with at most `concurrency` running at once.
///
/// Each job runs on tokio's blocking pool. A `concurrency` of 0 is treated
/// as 1.
pub fn convert_stream(
    dispatcher: &Dispatcher,
    jobs: Vec<ConversionJob>,
    concurrency: usize,
) -> JobStream {
    let concurrency = concurrency.max(1);
    info!("Starting batch of {} job(s), concurrency {}", jobs.len(), concurrency);

    let dispatcher = dispatcher.clone();
    let s = stream::iter(jobs.into_iter().enumerate().map(move |(index, job)| {
        let dispatcher = dispatcher.clone();
        async move { (index, dispatcher.convert_async(job).await) }
    }))
    .buffer_unordered(concurrency);

    Box::pin(s)
}

/// Convert every job and return the results in input order.
pub async fn convert_all(
    dispatcher: &Dispatcher,
    jobs: Vec<ConversionJob>,
    concurrency: usize,
) -> Vec<ConversionResult> {
    let mut results: Vec<(usize, ConversionResult)> =
        convert_stream(dispatcher, jobs, concurrency).collect().await;
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}
