//! Bulk row import.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use actors::{JobManager, Worker, WorkerError, WorkerFuture, error_metadata, worker_future};
use jobs_core::JobId;
use serde_json::{Map, Value, json};

use crate::metadata;

/// One row to import.
pub type Row = Map<String, Value>;

/// What the sink did with one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Created,
    Updated,
    Skipped,
}

/// Destination of an import.
pub trait ImportSink: Send + Sync + 'static {
    /// Write one chunk. Returns one outcome per row, in order.
    fn write_chunk(
        &self,
        rows: &[Row],
        update_existing: bool,
    ) -> impl Future<Output = Result<Vec<RowOutcome>, String>> + Send;
}

/// Imports `rows` into `sink`, `chunk` rows at a time.
///
/// Cancellation is checked and progress written once per chunk.
pub struct ImportWorker<S: ImportSink> {
    job_id: Option<JobId>,
    rows: Vec<Row>,
    chunk: usize,
    update_existing: bool,
    sink: Arc<S>,
}

impl<S: ImportSink> ImportWorker<S> {
    pub fn new(rows: Vec<Row>, sink: Arc<S>) -> Self {
        Self {
            job_id: None,
            rows,
            chunk: 20,
            update_existing: true,
            sink,
        }
    }

    /// Rows per chunk. Defaults to 20; zero is treated as one.
    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Whether rows whose key already exists overwrite the stored row
    /// (default) or are skipped.
    pub fn update_existing(mut self, enabled: bool) -> Self {
        self.update_existing = enabled;
        self
    }
}

#[derive(Debug, Default)]
struct Tally {
    created: u64,
    updated: u64,
    skipped: u64,
}

impl Tally {
    fn add(&mut self, outcomes: &[RowOutcome]) {
        for outcome in outcomes {
            match outcome {
                RowOutcome::Created => self.created += 1,
                RowOutcome::Updated => self.updated += 1,
                RowOutcome::Skipped => self.skipped += 1,
            }
        }
    }

    fn report(&self, message: String) -> jobs_core::Metadata {
        metadata(json!({
            "message": message,
            "created": self.created,
            "updated": self.updated,
            "skipped": self.skipped,
        }))
    }
}

impl<S: ImportSink> Worker for ImportWorker<S> {
    fn kind(&self) -> &str {
        "import"
    }

    fn assign_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture {
        let Some(id) = self.job_id else {
            return worker_future(async { Err(WorkerError::msg("worker has no job id")) });
        };
        let ImportWorker {
            rows,
            chunk,
            update_existing,
            sink,
            ..
        } = *self;

        worker_future(async move {
            let total = rows.len() as u64;
            if !manager.start_job(id, total).await?.is_applied() {
                return Ok(());
            }

            let mut tally = Tally::default();
            let mut done = 0u64;

            for batch in rows.chunks(chunk) {
                if manager.check_if_canceled(id).await? {
                    let message = format!("Import stopped after {done} of {total} rows.");
                    manager.cancel_job(id, tally.report(message)).await?;
                    return Ok(());
                }

                let outcomes = match sink.write_chunk(batch, update_existing).await {
                    Ok(outcomes) => outcomes,
                    Err(error) => {
                        tracing::error!("Import job {} failed after {} rows: {}", id, done, error);
                        let mut failure = error_metadata(error);
                        failure.extend(tally.report(format!("Failed after {done} rows.")));
                        manager.fail_job(id, failure).await?;
                        return Ok(());
                    }
                };
                tally.add(&outcomes);
                done += batch.len() as u64;

                let outcome = manager
                    .update_job_state(id, done, Default::default())
                    .await?;
                if !outcome.is_applied() {
                    return Ok(());
                }
            }

            tracing::info!(
                "Import job {} done: {} created, {} updated, {} skipped",
                id,
                tally.created,
                tally.updated,
                tally.skipped
            );
            manager
                .complete_job(id, tally.report(format!("{total} rows imported.")))
                .await?;
            Ok(())
        })
    }
}

/// In-memory sink keyed by one field of each row.
///
/// Rows without the key field are skipped.
#[derive(Debug)]
pub struct MemorySink {
    key_field: String,
    rows: Mutex<BTreeMap<String, Row>>,
}

impl MemorySink {
    pub fn new(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Row> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn key_of(&self, row: &Row) -> Option<String> {
        match row.get(&self.key_field)? {
            Value::String(key) => Some(key.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl ImportSink for MemorySink {
    async fn write_chunk(
        &self,
        rows: &[Row],
        update_existing: bool,
    ) -> Result<Vec<RowOutcome>, String> {
        let mut stored = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let outcomes = rows
            .iter()
            .map(|row| {
                let Some(key) = self.key_of(row) else {
                    return RowOutcome::Skipped;
                };
                match stored.get_mut(&key) {
                    Some(existing) if update_existing => {
                        *existing = row.clone();
                        RowOutcome::Updated
                    }
                    Some(_) => RowOutcome::Skipped,
                    None => {
                        stored.insert(key, row.clone());
                        RowOutcome::Created
                    }
                }
            })
            .collect();
        Ok(outcomes)
    }
}
