//! The worker contract.

use std::future::Future;
use std::pin::Pin;

use jobs_core::JobId;

use crate::{JobManager, WorkerError};

/// Result type for workers.
pub type WorkerResult = Result<(), WorkerError>;

/// Future returned by [`Worker::handle`].
pub type WorkerFuture = Pin<Box<dyn Future<Output = WorkerResult> + Send>>;

/// Box a worker body. Pins the output type so `?` works inside `async` blocks.
pub fn worker_future<F>(future: F) -> WorkerFuture
where
    F: Future<Output = WorkerResult> + Send + 'static,
{
    Box::pin(future)
}

/// A unit of background work.
///
/// The manager calls `assign_job_id` once before the worker is queued. The
/// queue calls `handle` once at execution time; it consumes the worker.
/// `handle` should call `start_job` early, report progress, check for
/// cancellation at its own checkpoints and end with exactly one of
/// `complete_job`, `fail_job` or `cancel_job`.
pub trait Worker: Send + 'static {
    /// Short name used in logs.
    fn kind(&self) -> &str;

    /// Receive the id of the job record created for this worker.
    fn assign_job_id(&mut self, id: JobId);

    /// Execute the work.
    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture;
}

/// A closure-based worker.
pub struct FnWorker<F>
where
    F: FnOnce(JobId, JobManager) -> WorkerFuture + Send + 'static,
{
    kind: String,
    job_id: Option<JobId>,
    body: F,
}

impl<F> FnWorker<F>
where
    F: FnOnce(JobId, JobManager) -> WorkerFuture + Send + 'static,
{
    pub fn new(kind: impl Into<String>, body: F) -> Self {
        Self {
            kind: kind.into(),
            job_id: None,
            body,
        }
    }
}

impl<F> Worker for FnWorker<F>
where
    F: FnOnce(JobId, JobManager) -> WorkerFuture + Send + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn assign_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture {
        let this = *self;
        match this.job_id {
            Some(id) => (this.body)(id, manager),
            None => worker_future(async { Err(WorkerError::msg("worker has no job id")) }),
        }
    }
}

/// Build a [`FnWorker`] from an async block.
#[macro_export]
macro_rules! fn_worker {
    ($kind:expr, |$id:ident, $manager:ident| $body:expr) => {
        $crate::FnWorker::new($kind, move |$id: $crate::JobId, $manager: $crate::JobManager| {
            $crate::worker_future(async move { $body })
        })
    };
}
