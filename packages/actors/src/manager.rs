//! The job lifecycle manager.
//!
//! `JobManager` is the only code that writes job records. Workers call back
//! into it while they run; operators use it to cancel and delete jobs;
//! pollers read progress through it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use db::{JobFilter, JobRepository, WriteOutcome};
use jobs_core::{
    Caller, DispatchParams, Job, JobEvent, JobId, JobProgress, JobStatus, Metadata,
    ProgressReport, render_metadata_block,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::queue::{UNFINISHED_MESSAGE, error_metadata};
use crate::{CancelSignals, JobQueue, ManagerError, QueuedWork, Worker};

/// Lifecycle manager for job records.
///
/// Cheap to clone; clones share the store, the queue, the cancellation
/// signals and the event channel.
#[derive(Clone)]
pub struct JobManager {
    repo: JobRepository,
    queue: Arc<dyn JobQueue>,
    simple_job: bool,
    signals: CancelSignals,
    events: broadcast::Sender<JobEvent>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("simple_job", &self.simple_job)
            .field("live_signals", &self.signals.len())
            .finish()
    }
}

impl JobManager {
    pub fn new(repo: JobRepository, queue: Arc<dyn JobQueue>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            repo,
            queue,
            simple_job: false,
            signals: CancelSignals::new(),
            events,
        }
    }

    /// Delete records of successfully completed jobs instead of keeping them.
    pub fn simple_job(mut self, enabled: bool) -> Self {
        self.simple_job = enabled;
        self
    }

    pub fn is_simple_job(&self) -> bool {
        self.simple_job
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// In-process cancellation token of a live job.
    pub fn cancellation_token(&self, id: JobId) -> Option<CancellationToken> {
        self.signals.get(id)
    }

    /// Create a record for `worker` and queue it for immediate execution.
    pub async fn dispatch<W: Worker>(
        &self,
        worker: W,
        label: impl Into<String>,
        params: DispatchParams,
    ) -> Result<JobId, ManagerError> {
        self.dispatch_after(worker, label, params, Duration::ZERO)
            .await
    }

    /// Create a record for `worker` and queue it to run after `delay`.
    ///
    /// The id is returned once the queue accepted the work. If the queue
    /// refuses it, the record is removed again and the error returned.
    pub async fn dispatch_after<W: Worker>(
        &self,
        mut worker: W,
        label: impl Into<String>,
        params: DispatchParams,
        delay: Duration,
    ) -> Result<JobId, ManagerError> {
        let job = self.repo.create(&Job::from_dispatch(label, &params)).await?;
        let job_id = job.id;

        worker.assign_job_id(job_id);
        self.signals.register(job_id);

        let work = QueuedWork::new(job_id, Box::new(worker), self.clone());
        let submitted = if delay.is_zero() {
            self.queue.push(work)
        } else {
            self.queue.later(delay, work)
        };

        if let Err(e) = submitted {
            tracing::error!("Queue rejected job {}: {}", job_id, e);
            self.signals.remove(job_id);
            if let Err(cleanup) = self.repo.delete_many(&[job_id]).await {
                tracing::error!("Could not remove record of rejected job {}: {}", job_id, cleanup);
            }
            return Err(e.into());
        }

        tracing::info!("Dispatched job {}: {}", job_id, job.label);
        self.emit(JobEvent::Dispatched {
            job_id,
            label: job.label,
            timestamp: Utc::now(),
        });

        Ok(job_id)
    }

    /// Mark the job as running and set its progress denominator.
    pub async fn start_job(&self, id: JobId, total: u64) -> Result<WriteOutcome, ManagerError> {
        let outcome = self.repo.start(id, total).await?;
        if self.note(id, "start_job", &outcome) {
            tracing::info!("Job {} started with {} items", id, total);
            self.emit(JobEvent::Started {
                job_id: id,
                total,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Record progress. Non-empty `metadata` replaces the stored document.
    pub async fn update_job_state(
        &self,
        id: JobId,
        current: u64,
        metadata: Metadata,
    ) -> Result<WriteOutcome, ManagerError> {
        let metadata = non_empty(&metadata);
        let outcome = self.repo.update_progress(id, current, metadata).await?;
        if self.note(id, "update_job_state", &outcome) {
            tracing::debug!("Job {} at {}", id, current);
            self.emit(JobEvent::Progress {
                job_id: id,
                current,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Replace the metadata document.
    pub async fn update_metadata(
        &self,
        id: JobId,
        metadata: Metadata,
    ) -> Result<WriteOutcome, ManagerError> {
        let outcome = self.repo.replace_metadata(id, &metadata).await?;
        self.note(id, "update_metadata", &outcome);
        Ok(outcome)
    }

    /// Finish successfully: `progress = progress_max`, status COMPLETE.
    ///
    /// In simple-job mode the record is deleted instead.
    pub async fn complete_job(
        &self,
        id: JobId,
        metadata: Metadata,
    ) -> Result<WriteOutcome, ManagerError> {
        let outcome = if self.simple_job {
            self.repo.delete_unfinished(id).await?
        } else {
            self.repo.complete(id, non_empty(&metadata)).await?
        };

        if self.note(id, "complete_job", &outcome) {
            self.signals.remove(id);
            tracing::info!("Job {} completed", id);
            self.emit(JobEvent::Completed {
                job_id: id,
                timestamp: Utc::now(),
            });
            if self.simple_job {
                self.emit(JobEvent::Deleted {
                    job_id: id,
                    timestamp: Utc::now(),
                });
            }
        }
        Ok(outcome)
    }

    /// Finish with status ERROR. Failed records are kept in every mode.
    pub async fn fail_job(&self, id: JobId, metadata: Metadata) -> Result<WriteOutcome, ManagerError> {
        let error = metadata
            .get("error")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let outcome = self
            .repo
            .finish(id, JobStatus::Error, non_empty(&metadata))
            .await?;

        if self.note(id, "fail_job", &outcome) {
            self.signals.remove(id);
            tracing::warn!(
                "Job {} failed: {}",
                id,
                error.as_deref().unwrap_or("no error message")
            );
            self.emit(JobEvent::Failed {
                job_id: id,
                error,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Finish with status STOPPED after the worker observed a cancel request.
    pub async fn cancel_job(
        &self,
        id: JobId,
        metadata: Metadata,
    ) -> Result<WriteOutcome, ManagerError> {
        let outcome = self
            .repo
            .finish(id, JobStatus::Stopped, non_empty(&metadata))
            .await?;

        if self.note(id, "cancel_job", &outcome) {
            self.signals.remove(id);
            tracing::info!("Job {} stopped", id);
            self.emit(JobEvent::Stopped {
                job_id: id,
                forced: false,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Whether cancellation was requested. Never writes.
    pub async fn check_if_canceled(&self, id: JobId) -> Result<bool, ManagerError> {
        if self.signals.is_tripped(id) {
            return Ok(true);
        }
        Ok(self.repo.is_canceled(id).await?.unwrap_or(false))
    }

    /// Decoded metadata; empty when the record or its document is missing.
    pub async fn get_metadata(&self, id: JobId) -> Result<Metadata, ManagerError> {
        Ok(self
            .repo
            .get(id)
            .await?
            .map(|job| job.metadata)
            .unwrap_or_default())
    }

    /// Ask a live job to stop. Terminal and missing jobs are left alone.
    pub async fn request_cancel(&self, id: JobId) -> Result<WriteOutcome, ManagerError> {
        let outcome = self.repo.set_canceled(id).await?;
        if self.note(id, "request_cancel", &outcome) {
            self.signals.trip(id);
            tracing::info!("Cancellation requested for job {}", id);
            self.emit(JobEvent::CancelRequested {
                job_id: id,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Stop a live job immediately, without waiting for its worker.
    ///
    /// Only operators may do this. A worker that is still running keeps
    /// calling in; its writes are ignored because the record is terminal.
    pub async fn force_cancel(
        &self,
        id: JobId,
        caller: &Caller,
    ) -> Result<WriteOutcome, ManagerError> {
        if !caller.is_privileged() {
            return Err(ManagerError::Forbidden(
                "forced cancel requires an operator".to_string(),
            ));
        }

        let outcome = self.repo.force_stop(id).await?;
        if self.note(id, "force_cancel", &outcome) {
            self.signals.trip(id);
            self.signals.remove(id);
            tracing::warn!(
                "Job {} force-stopped by {}",
                id,
                caller.owner().unwrap_or("unknown")
            );
            self.emit(JobEvent::Stopped {
                job_id: id,
                forced: true,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }

    /// Delete records in any status. Unknown ids are skipped.
    pub async fn delete_jobs(&self, ids: &[JobId]) -> Result<Vec<JobId>, ManagerError> {
        let deleted = self.repo.delete_many(ids).await?;
        for id in &deleted {
            self.signals.remove(*id);
            self.emit(JobEvent::Deleted {
                job_id: *id,
                timestamp: Utc::now(),
            });
        }
        tracing::info!("Deleted {} of {} requested jobs", deleted.len(), ids.len());
        Ok(deleted)
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>, ManagerError> {
        Ok(self.repo.get(id).await?)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, ManagerError> {
        Ok(self.repo.list(filter).await?)
    }

    /// Progress snapshot of the requested jobs, in request order.
    ///
    /// Unknown ids are left out and repeated ids answered once. A single-job
    /// query also carries the rendered metadata block.
    pub async fn progress(&self, ids: &[JobId]) -> Result<ProgressReport, ManagerError> {
        let mut unique: Vec<JobId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        let ids = unique.as_slice();
        let jobs = self.repo.get_many(ids).await?;

        let snapshots = ids
            .iter()
            .filter_map(|id| jobs.iter().find(|job| job.id == *id))
            .map(JobProgress::from)
            .collect();

        let metadata = match (ids, jobs.as_slice()) {
            ([_], [job]) if !job.metadata.is_empty() => Some(render_metadata_block(&job.metadata)),
            _ => None,
        };

        Ok(ProgressReport {
            jobs: snapshots,
            metadata,
        })
    }

    /// Fail a job whose worker returned without finishing it.
    pub(crate) async fn fail_if_unfinished(&self, id: JobId) -> Result<(), ManagerError> {
        if let Some(job) = self.repo.get(id).await?
            && !job.status.is_terminal()
        {
            tracing::error!("Job {} left in status {} by its worker", id, job.status);
            self.fail_job(id, error_metadata(UNFINISHED_MESSAGE)).await?;
        }
        Ok(())
    }

    /// Log ignored writes. Returns true when the write was applied.
    fn note(&self, id: JobId, operation: &str, outcome: &WriteOutcome) -> bool {
        match outcome {
            WriteOutcome::Applied(_) => true,
            WriteOutcome::Ignored(status) => {
                tracing::warn!(
                    "Ignored {} for job {}: already {}",
                    operation,
                    id,
                    status
                );
                false
            }
            WriteOutcome::Missing => {
                tracing::warn!("Ignored {} for job {}: no such record", operation, id);
                false
            }
        }
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn non_empty(metadata: &Metadata) -> Option<&Metadata> {
    (!metadata.is_empty()).then_some(metadata)
}
