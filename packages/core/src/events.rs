//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{JobId, JobStatus};

/// Events emitted by the job manager for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job record was created and handed to the queue.
    Dispatched {
        job_id: JobId,
        label: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker started and calibrated its progress.
    Started {
        job_id: JobId,
        total: u64,
        timestamp: DateTime<Utc>,
    },
    /// A worker reported progress.
    Progress {
        job_id: JobId,
        current: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job completed successfully.
    Completed {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    Failed {
        job_id: JobId,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A job was stopped, by its worker or forcibly.
    Stopped {
        job_id: JobId,
        forced: bool,
        timestamp: DateTime<Utc>,
    },
    /// Someone asked a running job to stop.
    CancelRequested {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// A job record was deleted.
    Deleted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::Dispatched { timestamp, .. }
            | JobEvent::Started { timestamp, .. }
            | JobEvent::Progress { timestamp, .. }
            | JobEvent::Completed { timestamp, .. }
            | JobEvent::Failed { timestamp, .. }
            | JobEvent::Stopped { timestamp, .. }
            | JobEvent::CancelRequested { timestamp, .. }
            | JobEvent::Deleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID this event is about.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Dispatched { job_id, .. }
            | JobEvent::Started { job_id, .. }
            | JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. }
            | JobEvent::Stopped { job_id, .. }
            | JobEvent::CancelRequested { job_id, .. }
            | JobEvent::Deleted { job_id, .. } => *job_id,
        }
    }

    /// Status the job is known to be in after this event, if the event implies one.
    pub fn implied_status(&self) -> Option<JobStatus> {
        match self {
            JobEvent::Dispatched { .. } => Some(JobStatus::Queued),
            JobEvent::Started { .. } | JobEvent::Progress { .. } => Some(JobStatus::InProgress),
            JobEvent::Completed { .. } => Some(JobStatus::Complete),
            JobEvent::Failed { .. } => Some(JobStatus::Error),
            JobEvent::Stopped { .. } => Some(JobStatus::Stopped),
            JobEvent::CancelRequested { .. } | JobEvent::Deleted { .. } => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::Dispatched { job_id, label, .. } => {
                format!("Job {} dispatched: {}", job_id, label)
            }
            JobEvent::Started { job_id, total, .. } => {
                format!("Job {} started ({} items)", job_id, total)
            }
            JobEvent::Progress {
                job_id, current, ..
            } => format!("Job {} at {}", job_id, current),
            JobEvent::Completed { job_id, .. } => format!("Job {} completed", job_id),
            JobEvent::Failed { job_id, error, .. } => {
                let error = error.as_deref().unwrap_or("no error message");
                format!("Job {} failed: {}", job_id, error)
            }
            JobEvent::Stopped { job_id, forced, .. } => {
                let how = if *forced { " (forced)" } else { "" };
                format!("Job {} stopped{}", job_id, how)
            }
            JobEvent::CancelRequested { job_id, .. } => {
                format!("Job {} asked to cancel", job_id)
            }
            JobEvent::Deleted { job_id, .. } => format!("Job {} deleted", job_id),
        }
    }
}
