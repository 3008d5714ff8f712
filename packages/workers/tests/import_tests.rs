#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;

use actors::DispatchParams;
use jobs_core::{JobEvent, JobStatus};
use serde_json::json;
use workers::{ImportSink, ImportWorker, MemorySink, Row, RowOutcome};

fn rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|n| {
            let mut row = Row::new();
            row.insert("id".to_string(), json!(format!("row-{n}")));
            row.insert("value".to_string(), json!(n));
            row
        })
        .collect()
}

struct BrokenSink;

impl ImportSink for BrokenSink {
    async fn write_chunk(&self, _rows: &[Row], _update: bool) -> Result<Vec<RowOutcome>, String> {
        Err("table is locked".to_string())
    }
}

#[tokio::test]
async fn import_reports_progress_once_per_chunk() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;
    let mut events = manager.subscribe();
    let sink = Arc::new(MemorySink::new("id"));

    let id = manager
        .dispatch(
            ImportWorker::new(rows(45), sink.clone()).with_chunk(20),
            "Import rows",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!((job.progress, job.progress_max), (45, 45));
    assert_eq!(job.metadata["created"], json!(45));
    assert_eq!(job.metadata["skipped"], json!(0));
    assert_eq!(common::meta_text(&job, "message"), "45 rows imported.");
    assert_eq!(sink.len(), 45);

    let mut updates = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let JobEvent::Progress { current, .. } = event {
            updates.push(current);
        }
    }
    assert_eq!(updates, vec![20, 40, 45]);
    Ok(())
}

#[tokio::test]
async fn existing_rows_are_skipped_without_update() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;
    let sink = Arc::new(MemorySink::new("id"));
    sink.write_chunk(&rows(3), true).await?;

    let id = manager
        .dispatch(
            ImportWorker::new(rows(5), sink.clone()).update_existing(false),
            "Import rows",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!(job.metadata["created"], json!(2));
    assert_eq!(job.metadata["updated"], json!(0));
    assert_eq!(job.metadata["skipped"], json!(3));
    Ok(())
}

#[tokio::test]
async fn cancel_before_the_first_chunk_imports_nothing() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;
    let sink = Arc::new(MemorySink::new("id"));

    let id = manager
        .dispatch(
            ImportWorker::new(rows(10), sink.clone()).with_chunk(5),
            "Import rows",
            DispatchParams::new(),
        )
        .await?;
    manager.request_cancel(id).await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Stopped);
    assert_eq!(job.progress, 0);
    assert_eq!(
        common::meta_text(&job, "message"),
        "Import stopped after 0 of 10 rows."
    );
    assert!(sink.is_empty());
    Ok(())
}

#[tokio::test]
async fn sink_errors_fail_the_job() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            ImportWorker::new(rows(4), Arc::new(BrokenSink)),
            "Import rows",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(common::meta_text(&job, "error"), "table is locked");
    Ok(())
}
