//! Job repository: the persisted job records.

use chrono::{DateTime, Utc};
use jobs_core::{
    Job, JobId, JobStatus, Metadata, decode_metadata, encode_metadata,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{Database, DbError};

/// Result of a guarded single-record write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write went through; carries the record as stored afterwards.
    Applied(Job),
    /// The record is already in this terminal state; nothing changed.
    Ignored(JobStatus),
    /// No record with this id exists; nothing changed.
    Missing,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied(_))
    }

    pub fn job(&self) -> Option<&Job> {
        match self {
            WriteOutcome::Applied(job) => Some(job),
            _ => None,
        }
    }
}

/// Filter options for listing jobs.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub owner: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Fields written when a record is created; timestamps come from the schema defaults.
#[derive(Debug, Serialize)]
struct JobCreate {
    job_id: String,
    label: String,
    status: i64,
    progress: i64,
    progress_max: i64,
    owner: Option<String>,
    is_privileged: bool,
    is_canceled: bool,
    metadata: String,
}

/// A job row as SurrealDB returns it. The record id itself is not read.
#[derive(Debug, Deserialize)]
struct JobRow {
    job_id: String,
    label: String,
    status: i64,
    progress: i64,
    progress_max: i64,
    #[serde(default)]
    owner: Option<String>,
    is_privileged: bool,
    is_canceled: bool,
    metadata: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = DbError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = JobId::parse(&row.job_id)
            .map_err(|e| DbError::Query(format!("invalid job id {}: {}", row.job_id, e)))?;
        let status = u8::try_from(row.status)
            .map_err(|_| DbError::Query(format!("job {} has status {}", id, row.status)))
            .and_then(|code| {
                JobStatus::from_code(code).map_err(|e| DbError::Query(format!("job {}: {}", id, e)))
            })?;

        Ok(Job {
            id,
            label: row.label,
            status,
            progress: non_negative(row.progress),
            progress_max: non_negative(row.progress_max),
            owner: row.owner,
            is_privileged: row.is_privileged,
            is_canceled: row.is_canceled,
            metadata: decode_metadata(&row.metadata),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn rows_to_jobs(rows: Vec<JobRow>) -> Result<Vec<Job>, DbError> {
    rows.into_iter().map(Job::try_from).collect()
}

/// Guarded update of one record. Only non-terminal records match, so a
/// write after COMPLETE/ERROR/STOPPED, or against a deleted id, touches
/// nothing.
fn guarded_update(assignments: &str) -> String {
    format!(
        "UPDATE job SET {assignments}, updated_at = time::now() \
         WHERE job_id = $job_id AND status < 2 RETURN AFTER"
    )
}

/// Repository for job persistence operations.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new record.
    pub async fn create(&self, job: &Job) -> Result<Job, DbError> {
        let content = JobCreate {
            job_id: job.id.to_string(),
            label: job.label.clone(),
            status: i64::from(job.status.code()),
            progress: to_int(job.progress),
            progress_max: to_int(job.progress_max),
            owner: job.owner.clone(),
            is_privileged: job.is_privileged,
            is_canceled: job.is_canceled,
            metadata: encode_metadata(&job.metadata),
        };

        let row: Option<JobRow> = self
            .db
            .create(("job", job.id.to_string()))
            .content(content)
            .await?;

        row.ok_or_else(|| DbError::Query(format!("Failed to create job {}", job.id)))?
            .try_into()
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Option<Job>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM job WHERE job_id = $job_id LIMIT 1")
            .bind(("job_id", id.to_string()))
            .await?;

        let rows: Vec<JobRow> = result.take(0)?;
        rows.into_iter().next().map(Job::try_from).transpose()
    }

    /// Get several jobs at once. Unknown ids are left out.
    pub async fn get_many(&self, ids: &[JobId]) -> Result<Vec<Job>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let mut result = self
            .db
            .query("SELECT * FROM job WHERE job_id IN $ids ORDER BY created_at DESC")
            .bind(("ids", ids))
            .await?;

        rows_to_jobs(result.take(0)?)
    }

    /// List jobs, newest first.
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, DbError> {
        let mut conditions = Vec::new();
        let mut bindings: Vec<(&'static str, Value)> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = $status");
            bindings.push(("status", json!(status.code())));
        }

        if let Some(owner) = &filter.owner {
            conditions.push("owner = $owner");
            bindings.push(("owner", json!(owner)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = filter
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();

        let offset_clause = filter
            .offset
            .map(|o| format!("START {}", o))
            .unwrap_or_default();

        let query = format!(
            "SELECT * FROM job {} ORDER BY created_at DESC {} {}",
            where_clause, limit_clause, offset_clause
        );

        let mut result = self.db.query(&query);

        for (name, value) in bindings {
            result = result.bind((name, value));
        }

        let mut response = result.await?;
        rows_to_jobs(response.take(0)?)
    }

    /// Read only the cancellation flag. `None` when the record is gone.
    pub async fn is_canceled(&self, id: JobId) -> Result<Option<bool>, DbError> {
        #[derive(Deserialize)]
        struct Flag {
            is_canceled: bool,
        }

        let mut result = self
            .db
            .query("SELECT is_canceled FROM job WHERE job_id = $job_id LIMIT 1")
            .bind(("job_id", id.to_string()))
            .await?;

        let flags: Vec<Flag> = result.take(0)?;
        Ok(flags.into_iter().next().map(|flag| flag.is_canceled))
    }

    /// Mark the worker as started and (re)calibrate the denominator.
    pub async fn start(&self, id: JobId, total: u64) -> Result<WriteOutcome, DbError> {
        self.guarded(
            id,
            "status = 1, progress = 0, progress_max = $total",
            vec![("total", json!(to_int(total)))],
        )
        .await
    }

    /// Record progress, optionally replacing the metadata document.
    pub async fn update_progress(
        &self,
        id: JobId,
        current: u64,
        metadata: Option<&Metadata>,
    ) -> Result<WriteOutcome, DbError> {
        let mut bindings = vec![("progress", json!(to_int(current)))];
        let assignments = match metadata {
            Some(metadata) => {
                bindings.push(("metadata", json!(encode_metadata(metadata))));
                "progress = $progress, metadata = $metadata"
            }
            None => "progress = $progress",
        };
        self.guarded(id, assignments, bindings).await
    }

    /// Replace the metadata document.
    pub async fn replace_metadata(
        &self,
        id: JobId,
        metadata: &Metadata,
    ) -> Result<WriteOutcome, DbError> {
        self.guarded(
            id,
            "metadata = $metadata",
            vec![("metadata", json!(encode_metadata(metadata)))],
        )
        .await
    }

    /// Mark complete, forcing `progress = progress_max` with a zero maximum counted as one.
    pub async fn complete(
        &self,
        id: JobId,
        metadata: Option<&Metadata>,
    ) -> Result<WriteOutcome, DbError> {
        let base = "status = 2, \
                    progress_max = math::max([progress_max, 1]), \
                    progress = math::max([progress_max, 1])";
        self.finish_with(id, base, metadata).await
    }

    /// Move to ERROR or STOPPED.
    pub async fn finish(
        &self,
        id: JobId,
        status: JobStatus,
        metadata: Option<&Metadata>,
    ) -> Result<WriteOutcome, DbError> {
        let base = match status {
            JobStatus::Error => "status = 3",
            JobStatus::Stopped => "status = 4",
            JobStatus::Complete => return self.complete(id, metadata).await,
            other => {
                return Err(DbError::Query(format!(
                    "{} is not a terminal status",
                    other
                )));
            }
        };
        self.finish_with(id, base, metadata).await
    }

    /// Set the cooperative cancellation flag.
    pub async fn set_canceled(&self, id: JobId) -> Result<WriteOutcome, DbError> {
        self.guarded(id, "is_canceled = true", Vec::new()).await
    }

    /// Set the cancellation flag and stop the record immediately.
    pub async fn force_stop(&self, id: JobId) -> Result<WriteOutcome, DbError> {
        self.guarded(id, "is_canceled = true, status = 4", Vec::new())
            .await
    }

    /// Remove a record that has not reached a terminal state.
    ///
    /// Used instead of `complete` for fire-and-forget jobs.
    pub async fn delete_unfinished(&self, id: JobId) -> Result<WriteOutcome, DbError> {
        let mut result = self
            .db
            .query("DELETE job WHERE job_id = $job_id AND status < 2 RETURN BEFORE")
            .bind(("job_id", id.to_string()))
            .await?;

        let rows: Vec<JobRow> = result.take(0)?;
        match rows.into_iter().next() {
            Some(row) => Ok(WriteOutcome::Applied(row.try_into()?)),
            None => self.not_applied(id).await,
        }
    }

    /// Delete records regardless of status. Returns the ids that existed.
    pub async fn delete_many(&self, ids: &[JobId]) -> Result<Vec<JobId>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let mut result = self
            .db
            .query("DELETE job WHERE job_id IN $ids RETURN BEFORE")
            .bind(("ids", ids))
            .await?;

        let rows: Vec<JobRow> = result.take(0)?;
        Ok(rows_to_jobs(rows)?.into_iter().map(|job| job.id).collect())
    }

    async fn finish_with(
        &self,
        id: JobId,
        base: &str,
        metadata: Option<&Metadata>,
    ) -> Result<WriteOutcome, DbError> {
        match metadata {
            Some(metadata) => {
                self.guarded(
                    id,
                    &format!("{base}, metadata = $metadata"),
                    vec![("metadata", json!(encode_metadata(metadata)))],
                )
                .await
            }
            None => self.guarded(id, base, Vec::new()).await,
        }
    }

    async fn guarded(
        &self,
        id: JobId,
        assignments: &str,
        bindings: Vec<(&'static str, Value)>,
    ) -> Result<WriteOutcome, DbError> {
        let query = guarded_update(assignments);
        let mut pending = self.db.query(&query).bind(("job_id", id.to_string()));

        for binding in bindings {
            pending = pending.bind(binding);
        }

        let mut result = pending.await?;
        let rows: Vec<JobRow> = result.take(0)?;

        match rows.into_iter().next() {
            Some(row) => Ok(WriteOutcome::Applied(row.try_into()?)),
            None => self.not_applied(id).await,
        }
    }

    async fn not_applied(&self, id: JobId) -> Result<WriteOutcome, DbError> {
        Ok(match self.get(id).await? {
            Some(job) => WriteOutcome::Ignored(job.status),
            None => WriteOutcome::Missing,
        })
    }
}
