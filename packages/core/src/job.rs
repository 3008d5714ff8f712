//! Job domain types for records of dispatched work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::Caller;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Open key/value document attached to a job (errors, result references, counts).
pub type Metadata = serde_json::Map<String, Value>;

/// Decode a stored metadata document.
///
/// Anything that is not a JSON object (corrupt text, `null`, an array, the
/// empty string) is treated as "no metadata".
pub fn decode_metadata(raw: &str) -> Metadata {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Metadata::new(),
    }
}

/// Encode a metadata document for storage.
pub fn encode_metadata(metadata: &Metadata) -> String {
    Value::Object(metadata.clone()).to_string()
}

/// Current status of a job in its lifecycle.
///
/// The discriminants are the persisted status codes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created, worker not started yet.
    #[default]
    Queued = 0,
    /// Worker has started executing.
    InProgress = 1,
    /// Worker finished successfully.
    Complete = 2,
    /// Worker failed.
    Error = 3,
    /// Worker stopped on request, or the job was force-stopped.
    Stopped = 4,
}

/// Error returned when parsing an unknown status name or code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct ParseStatusError(pub String);

impl JobStatus {
    /// Persisted numeric code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Map a persisted code back to a status.
    pub fn from_code(code: u8) -> Result<Self, ParseStatusError> {
        match code {
            0 => Ok(JobStatus::Queued),
            1 => Ok(JobStatus::InProgress),
            2 => Ok(JobStatus::Complete),
            3 => Ok(JobStatus::Error),
            4 => Ok(JobStatus::Stopped),
            other => Err(ParseStatusError(other.to_string())),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(self) -> bool {
        self.code() >= JobStatus::Complete.code()
    }

    /// A cancellation request is only meaningful before a terminal state.
    pub fn can_be_canceled(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::InProgress)
    }

    /// Get a simple status string for filtering and CSS classes.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
            JobStatus::Stopped => "stopped",
        }
    }

    /// Human-readable label shown to operators.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::InProgress => "Processing",
            JobStatus::Complete => "Complete",
            JobStatus::Error => "Crashed",
            JobStatus::Stopped => "Stopped",
        }
    }

    /// Label for a raw code, including codes this build does not know.
    pub fn label_for_code(code: u8) -> &'static str {
        JobStatus::from_code(code).map_or("Unknown", JobStatus::label)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "in_progress" => Ok(JobStatus::InProgress),
            "complete" => Ok(JobStatus::Complete),
            "error" => Ok(JobStatus::Error),
            "stopped" => Ok(JobStatus::Stopped),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Optional parameters recognized by dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchParams {
    /// Initial metadata document.
    pub metadata: Option<Metadata>,
    /// Initial `progress_max`.
    pub count: Option<u64>,
    /// Who is dispatching; resolves `owner` and `is_privileged`.
    pub caller: Caller,
}

impl DispatchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial progress denominator.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Set the initial metadata document.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the dispatching caller.
    pub fn by(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }
}

/// A job record: the persisted state of one dispatched unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Display label, fixed at dispatch.
    pub label: String,
    /// Current status.
    pub status: JobStatus,
    /// Units of work done so far.
    pub progress: u64,
    /// Total expected units; 0 means "not known yet".
    pub progress_max: u64,
    /// Identifier of the dispatching principal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Dispatched from an elevated (operator) context.
    #[serde(default)]
    pub is_privileged: bool,
    /// Cooperative cancellation has been requested.
    #[serde(default)]
    pub is_canceled: bool,
    /// Job-specific auxiliary data.
    #[serde(default)]
    pub metadata: Metadata,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            label: label.into(),
            status: JobStatus::Queued,
            progress: 0,
            progress_max: 0,
            owner: None,
            is_privileged: false,
            is_canceled: false,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the record a dispatch inserts.
    pub fn from_dispatch(label: impl Into<String>, params: &DispatchParams) -> Self {
        let mut job = Self::new(label);
        job.progress_max = params.count.unwrap_or(0);
        job.metadata = params.metadata.clone().unwrap_or_default();
        job.owner = params.caller.owner().map(str::to_string);
        job.is_privileged = params.caller.is_privileged();
        job
    }

    /// Denominator used for percentages; a zero maximum counts as one.
    pub fn effective_max(&self) -> u64 {
        self.progress_max.max(1)
    }

    /// Rounded completion percentage, 0..=100.
    pub fn progress_percent(&self) -> u8 {
        let percent = (self.progress as f64 * 100.0 / self.effective_max() as f64).round();
        percent.clamp(0.0, 100.0) as u8
    }

    /// Whether a cooperative cancel request is accepted.
    pub fn can_be_canceled(&self) -> bool {
        self.status.can_be_canceled()
    }
}
