use jobs_core::Job;

use db::{DbConfig, DbError, JobRepository};

/// Fresh in-memory store per test.
pub async fn setup_repo() -> Result<JobRepository, DbError> {
    let db = db::connect(&DbConfig::memory()).await?;
    Ok(JobRepository::new(db))
}

pub async fn insert(repo: &JobRepository, label: &str) -> Result<Job, DbError> {
    repo.create(&Job::new(label)).await
}
