#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actors::{BufferedQueue, JobManager, JobQueue};
use db::{DbConfig, DbError, JobRepository};
use jobs_core::{Job, JobId};

pub async fn repo() -> Result<JobRepository, DbError> {
    let db = db::connect(&DbConfig::memory()).await?;
    Ok(JobRepository::new(db))
}

/// Manager over a fresh store and a queue the test drains by hand.
pub async fn setup() -> Result<(JobManager, Arc<BufferedQueue>), DbError> {
    setup_with(BufferedQueue::new()).await
}

pub async fn setup_with(queue: BufferedQueue) -> Result<(JobManager, Arc<BufferedQueue>), DbError> {
    let queue = Arc::new(queue);
    let manager = JobManager::new(repo().await?, queue.clone() as Arc<dyn JobQueue>);
    Ok((manager, queue))
}

pub async fn job(manager: &JobManager, id: JobId) -> Job {
    manager
        .get_job(id)
        .await
        .unwrap_or_default()
        .unwrap_or_else(|| panic!("job {} missing", id))
}

/// Poll until the job reaches a terminal state.
pub async fn wait_for_terminal(manager: &JobManager, id: JobId, limit: Duration) -> Option<Job> {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if let Ok(Some(job)) = manager.get_job(id).await
            && job.status.is_terminal()
        {
            return Some(job);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}
