#![allow(dead_code)]

use std::sync::Arc;

use actors::{BufferedQueue, JobManager, JobQueue};
use db::{DbConfig, DbError, JobRepository};
use jobs_core::{Job, JobId};

/// Manager over a fresh in-memory store and a queue drained by the test.
pub async fn setup() -> Result<(JobManager, Arc<BufferedQueue>), DbError> {
    let db = db::connect(&DbConfig::memory()).await?;
    let queue = Arc::new(BufferedQueue::new());
    let manager = JobManager::new(JobRepository::new(db), queue.clone() as Arc<dyn JobQueue>);
    Ok((manager, queue))
}

pub async fn job(manager: &JobManager, id: JobId) -> Job {
    manager
        .get_job(id)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| panic!("job {} missing", id))
}

/// Run the next queued worker on its own task.
pub fn run_in_background(queue: &Arc<BufferedQueue>) -> tokio::task::JoinHandle<bool> {
    let queue = queue.clone();
    tokio::spawn(async move { queue.run_next().await })
}

/// Metadata entry rendered as text, or "" when absent.
pub fn meta_text(job: &Job, key: &str) -> String {
    match job.metadata.get(key) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
