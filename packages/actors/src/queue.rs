//! The queue seam: where dispatched workers wait for execution.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use jobs_core::{JobId, Metadata};
use serde_json::Value;

use crate::{JobManager, QueueError, Worker};

/// Queue configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// Number of runner actors.
    pub concurrency: u32,
    /// How often an idle runner asks for work.
    pub poll_interval: Duration,
    /// Upper bound for one `handle` call; `None` disables the deadline.
    pub job_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(100),
            job_timeout: Some(Duration::from_secs(3600)),
        }
    }
}

impl QueueConfig {
    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }
}

/// Accepts workers for later execution.
///
/// Submission is fire-and-forget: implementations return once the work is
/// accepted, never after it ran.
pub trait JobQueue: Send + Sync {
    /// Run as soon as a runner is free.
    fn push(&self, work: QueuedWork) -> Result<(), QueueError>;

    /// Run no earlier than `delay` from now.
    fn later(&self, delay: Duration, work: QueuedWork) -> Result<(), QueueError>;
}

/// A dispatched worker together with what it needs to run.
pub struct QueuedWork {
    pub job_id: JobId,
    worker: Box<dyn Worker>,
    manager: JobManager,
}

impl std::fmt::Debug for QueuedWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedWork")
            .field("job_id", &self.job_id)
            .field("kind", &self.worker.kind())
            .finish()
    }
}

/// Metadata document recorded when the runner fails a job.
pub fn error_metadata(message: impl Into<String>) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("error".to_string(), Value::String(message.into()));
    metadata
}

pub(crate) const UNFINISHED_MESSAGE: &str = "worker finished without reporting a final state";

impl QueuedWork {
    pub fn new(job_id: JobId, worker: Box<dyn Worker>, manager: JobManager) -> Self {
        Self {
            job_id,
            worker,
            manager,
        }
    }

    pub fn kind(&self) -> &str {
        self.worker.kind()
    }

    /// Execute the worker.
    ///
    /// A timeout, a panic or an `Err` from `handle` fails the job with an
    /// `error` entry. A worker that returns `Ok` without finishing its job
    /// is failed as well, so no record stays IN_PROGRESS forever.
    pub async fn run(self, timeout: Option<Duration>) {
        let QueuedWork {
            job_id,
            worker,
            manager,
        } = self;
        let kind = worker.kind().to_string();

        tracing::info!("Running {} job {}", kind, job_id);

        let execution = AssertUnwindSafe(worker.handle(manager.clone())).catch_unwind();
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => {
                    let message = format!("Job timed out after {}s", limit.as_secs());
                    return fail(&manager, job_id, &kind, message).await;
                }
            },
            None => execution.await,
        };

        match outcome {
            Ok(Ok(())) => {
                if let Err(e) = manager.fail_if_unfinished(job_id).await {
                    tracing::error!("Could not verify final state of job {}: {}", job_id, e);
                }
            }
            Ok(Err(error)) => fail(&manager, job_id, &kind, error.to_string()).await,
            Err(panic) => fail(&manager, job_id, &kind, panic_message(&*panic)).await,
        }
    }
}

async fn fail(manager: &JobManager, job_id: JobId, kind: &str, message: String) {
    tracing::error!("{} job {} failed: {}", kind, job_id, message);
    if let Err(e) = manager.fail_job(job_id, error_metadata(message)).await {
        tracing::error!("Could not record failure of job {}: {}", job_id, e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("Worker panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("Worker panicked: {}", message)
    } else {
        "Worker panicked".to_string()
    }
}

/// In-process queue that holds work until it is drained explicitly.
///
/// Used by tests and the CLI to run workers deterministically.
#[derive(Debug, Default)]
pub struct BufferedQueue {
    pending: Mutex<VecDeque<(Duration, QueuedWork)>>,
    timeout: Option<Duration>,
}

impl BufferedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requested delays of the pending work, in submission order.
    pub fn delays(&self) -> Vec<Duration> {
        self.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Remove the oldest pending work without running it.
    pub fn take_next(&self) -> Option<QueuedWork> {
        self.lock().pop_front().map(|(_, work)| work)
    }

    /// Run the oldest pending work. Returns false when nothing was pending.
    pub async fn run_next(&self) -> bool {
        match self.take_next() {
            Some(work) => {
                work.run(self.timeout).await;
                true
            }
            None => false,
        }
    }

    /// Run pending work in order, including anything queued meanwhile.
    /// Delays are not waited for.
    pub async fn run_all(&self) -> usize {
        let mut count = 0;
        while self.run_next().await {
            count += 1;
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(Duration, QueuedWork)>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl JobQueue for BufferedQueue {
    fn push(&self, work: QueuedWork) -> Result<(), QueueError> {
        self.later(Duration::ZERO, work)
    }

    fn later(&self, delay: Duration, work: QueuedWork) -> Result<(), QueueError> {
        tracing::debug!("Buffered job {} (delay {:?})", work.job_id, delay);
        self.lock().push_back((delay, work));
        Ok(())
    }
}
