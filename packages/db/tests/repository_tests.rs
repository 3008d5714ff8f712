#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use jobs_core::{Caller, DispatchParams, Job, JobId, JobStatus, Metadata};
use serde_json::Value;

use db::{JobFilter, WriteOutcome};

fn metadata(key: &str, value: impl Into<Value>) -> Metadata {
    let mut map = Metadata::new();
    map.insert(key.to_string(), value.into());
    map
}

#[tokio::test]
async fn create_and_read_back() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;

    let params = DispatchParams::new()
        .with_count(10)
        .with_metadata(metadata("source", "upload.csv"))
        .by(Caller::Operator("7".into()));
    let job = Job::from_dispatch("Import rows", &params);
    let created = repo.create(&job).await?;

    assert_eq!(created.id, job.id);
    assert_eq!(created.status, JobStatus::Queued);
    assert_eq!(created.progress_max, 10);
    assert_eq!(created.owner.as_deref(), Some("7"));
    assert!(created.is_privileged);

    let loaded = repo.get(job.id).await?.unwrap();
    assert_eq!(loaded.label, "Import rows");
    assert_eq!(loaded.metadata.get("source"), Some(&Value::from("upload.csv")));

    assert!(repo.get(JobId::new()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn progress_writes_update_the_record() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let job = common::insert(&repo, "progress").await?;

    let started = repo.start(job.id, 10).await?;
    let started = started.job().unwrap();
    assert_eq!(started.status, JobStatus::InProgress);
    assert_eq!((started.progress, started.progress_max), (0, 10));

    repo.update_progress(job.id, 5, None).await?;
    let outcome = repo
        .update_progress(job.id, 6, Some(&metadata("step", "six")))
        .await?;
    let updated = outcome.job().unwrap();
    assert_eq!(updated.progress, 6);
    assert_eq!(updated.progress_percent(), 60);
    assert_eq!(updated.metadata.get("step"), Some(&Value::from("six")));

    repo.replace_metadata(job.id, &metadata("other", 1)).await?;
    let loaded = repo.get(job.id).await?.unwrap();
    assert!(loaded.metadata.get("step").is_none());
    assert_eq!(loaded.metadata.get("other"), Some(&Value::from(1)));
    Ok(())
}

#[tokio::test]
async fn complete_without_start_guards_the_denominator() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let job = common::insert(&repo, "quick").await?;

    let outcome = repo.complete(job.id, None).await?;
    let done = outcome.job().unwrap();
    assert_eq!(done.status, JobStatus::Complete);
    assert_eq!(done.progress_max, 1);
    assert_eq!(done.progress, 1);
    assert_eq!(done.progress_percent(), 100);
    Ok(())
}

#[tokio::test]
async fn complete_overrides_partial_progress() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let job = common::insert(&repo, "partial").await?;

    repo.start(job.id, 8).await?;
    repo.update_progress(job.id, 3, None).await?;
    let outcome = repo
        .complete(job.id, Some(&metadata("message", "All finished.")))
        .await?;

    let done = outcome.job().unwrap();
    assert_eq!((done.progress, done.progress_max), (8, 8));
    assert_eq!(done.metadata.get("message"), Some(&Value::from("All finished.")));
    Ok(())
}

#[tokio::test]
async fn terminal_records_ignore_later_writes() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let job = common::insert(&repo, "zombie").await?;

    repo.start(job.id, 4).await?;
    repo.force_stop(job.id).await?;

    assert_eq!(
        repo.update_progress(job.id, 3, None).await?,
        WriteOutcome::Ignored(JobStatus::Stopped)
    );
    assert_eq!(
        repo.complete(job.id, None).await?,
        WriteOutcome::Ignored(JobStatus::Stopped)
    );
    assert_eq!(
        repo.finish(job.id, JobStatus::Error, Some(&metadata("error", "late")))
            .await?,
        WriteOutcome::Ignored(JobStatus::Stopped)
    );

    let loaded = repo.get(job.id).await?.unwrap();
    assert_eq!(loaded.status, JobStatus::Stopped);
    assert!(loaded.is_canceled);
    assert_eq!(loaded.progress, 0);
    assert!(loaded.metadata.is_empty());
    Ok(())
}

#[tokio::test]
async fn writes_to_missing_records_create_nothing() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let ghost = JobId::new();

    assert_eq!(repo.start(ghost, 3).await?, WriteOutcome::Missing);
    assert_eq!(repo.update_progress(ghost, 1, None).await?, WriteOutcome::Missing);
    assert_eq!(repo.complete(ghost, None).await?, WriteOutcome::Missing);
    assert_eq!(repo.set_canceled(ghost).await?, WriteOutcome::Missing);
    assert_eq!(repo.is_canceled(ghost).await?, None);

    assert!(repo.get(ghost).await?.is_none());
    assert!(repo.list(&JobFilter::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn cancel_flag_is_only_set_on_live_records() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let live = common::insert(&repo, "live").await?;
    let done = common::insert(&repo, "done").await?;
    repo.complete(done.id, None).await?;

    assert_eq!(repo.is_canceled(live.id).await?, Some(false));
    assert!(repo.set_canceled(live.id).await?.is_applied());
    assert_eq!(repo.is_canceled(live.id).await?, Some(true));

    // The flag alone does not change status.
    assert_eq!(repo.get(live.id).await?.unwrap().status, JobStatus::Queued);

    assert_eq!(
        repo.set_canceled(done.id).await?,
        WriteOutcome::Ignored(JobStatus::Complete)
    );
    assert_eq!(repo.is_canceled(done.id).await?, Some(false));
    Ok(())
}

#[tokio::test]
async fn finish_rejects_non_terminal_targets() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let job = common::insert(&repo, "bad").await?;

    assert!(repo.finish(job.id, JobStatus::InProgress, None).await.is_err());

    let failed = repo
        .finish(job.id, JobStatus::Error, Some(&metadata("error", "boom")))
        .await?;
    assert_eq!(failed.job().unwrap().status, JobStatus::Error);
    Ok(())
}

#[tokio::test]
async fn delete_unfinished_skips_terminal_records() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let running = common::insert(&repo, "running").await?;
    let failed = common::insert(&repo, "failed").await?;
    repo.finish(failed.id, JobStatus::Error, None).await?;

    assert!(repo.delete_unfinished(running.id).await?.is_applied());
    assert!(repo.get(running.id).await?.is_none());

    assert_eq!(
        repo.delete_unfinished(failed.id).await?,
        WriteOutcome::Ignored(JobStatus::Error)
    );
    assert!(repo.get(failed.id).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn bulk_delete_ignores_unknown_ids() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let a = common::insert(&repo, "a").await?;
    let b = common::insert(&repo, "b").await?;
    let keep = common::insert(&repo, "keep").await?;
    repo.start(b.id, 2).await?;

    let mut deleted = repo.delete_many(&[a.id, b.id, JobId::new()]).await?;
    deleted.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(deleted, expected);

    let remaining = repo.list(&JobFilter::default()).await?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep.id);

    assert!(repo.delete_many(&[]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn list_and_get_many_filters() -> Result<(), Box<dyn Error>> {
    let repo = common::setup_repo().await?;
    let mine = repo
        .create(&Job::from_dispatch(
            "mine",
            &DispatchParams::new().by(Caller::User("alice".into())),
        ))
        .await?;
    let theirs = repo
        .create(&Job::from_dispatch(
            "theirs",
            &DispatchParams::new().by(Caller::User("bob".into())),
        ))
        .await?;
    repo.complete(theirs.id, None).await?;

    let by_owner = repo
        .list(&JobFilter {
            owner: Some("alice".into()),
            ..Default::default()
        })
        .await?;
    assert_eq!(by_owner.len(), 1);
    assert_eq!(by_owner[0].id, mine.id);

    let complete = repo
        .list(&JobFilter {
            status: Some(JobStatus::Complete),
            ..Default::default()
        })
        .await?;
    assert_eq!(complete.len(), 1);
    assert_eq!(complete[0].id, theirs.id);

    let limited = repo
        .list(&JobFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await?;
    assert_eq!(limited.len(), 1);

    let many = repo.get_many(&[mine.id, JobId::new()]).await?;
    assert_eq!(many.len(), 1);
    assert!(repo.get_many(&[]).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_metadata_reads_as_empty() -> Result<(), Box<dyn Error>> {
    let db = db::connect(&db::DbConfig::memory()).await?;
    let repo = db::JobRepository::new(db.clone());
    let job = common::insert(&repo, "corrupt").await?;

    db.query("UPDATE job SET metadata = '{not json' WHERE job_id = $job_id")
        .bind(("job_id", job.id.to_string()))
        .await?
        .check()?;

    let loaded = repo.get(job.id).await?.unwrap();
    assert!(loaded.metadata.is_empty());
    Ok(())
}
