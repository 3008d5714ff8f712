//! Wire types for the batched progress query.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Job, JobId, Metadata};

/// Progress snapshot of one job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub id: JobId,
    /// Display label for the status.
    pub status: String,
    /// Numeric status code.
    #[serde(rename = "statusCode")]
    pub status_code: u8,
    pub progress_current: u64,
    pub progress_max: u64,
    /// Rounded percentage, 0..=100.
    pub percent: u8,
}

impl JobProgress {
    /// Terminal jobs and finished bars no longer need progress affordances.
    pub fn is_finished(&self) -> bool {
        self.percent == 100 || self.status_code >= crate::JobStatus::Complete.code()
    }
}

impl From<&Job> for JobProgress {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status.label().to_string(),
            status_code: job.status.code(),
            progress_current: job.progress,
            progress_max: job.progress_max,
            percent: job.progress_percent(),
        }
    }
}

/// Response to a progress query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub jobs: Vec<JobProgress>,
    /// Rendered metadata block, present when a single job was queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl ProgressReport {
    pub fn get(&self, id: JobId) -> Option<&JobProgress> {
        self.jobs.iter().find(|job| job.id == id)
    }
}

/// Render metadata as `key: value` lines, sorted by key.
pub fn render_metadata_block(metadata: &Metadata) -> String {
    let mut keys: Vec<&String> = metadata.keys().collect();
    keys.sort();

    keys.into_iter()
        .map(|key| match &metadata[key] {
            Value::String(text) => format!("{key}: {text}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
