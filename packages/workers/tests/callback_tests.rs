#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;

use actors::DispatchParams;
use jobs_core::JobStatus;
use mockito::Matcher;
use serde_json::json;
use workers::CallbackWorker;

#[tokio::test]
async fn payload_is_posted_to_every_target() -> Result<(), Box<dyn Error>> {
    let mut server = mockito::Server::new_async().await;
    let payload = json!({ "event": "rates.updated", "count": 3 });
    let first = server
        .mock("POST", "/first")
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::Json(payload.clone()))
        .with_status(200)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/second")
        .match_body(Matcher::Json(payload.clone()))
        .with_status(204)
        .create_async()
        .await;

    let (manager, queue) = common::setup().await?;
    let targets = vec![
        format!("{}/first", server.url()),
        format!("{}/second", server.url()),
    ];
    let id = manager
        .dispatch(
            CallbackWorker::new(targets, payload).with_bearer_token("secret"),
            "Notify partners",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    first.assert_async().await;
    second.assert_async().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!((job.progress, job.progress_max), (2, 2));
    assert_eq!(common::meta_text(&job, "message"), "All finished.");
    Ok(())
}

#[tokio::test]
async fn an_error_status_fails_the_job_and_stops_sending() -> Result<(), Box<dyn Error>> {
    let mut server = mockito::Server::new_async().await;
    let broken = server
        .mock("POST", "/broken")
        .with_status(500)
        .create_async()
        .await;
    let never = server
        .mock("POST", "/never")
        .expect(0)
        .create_async()
        .await;

    let (manager, queue) = common::setup().await?;
    let targets = vec![
        format!("{}/broken", server.url()),
        format!("{}/never", server.url()),
    ];
    let id = manager
        .dispatch(
            CallbackWorker::new(targets, json!({})),
            "Notify partners",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    broken.assert_async().await;
    never.assert_async().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.progress, 0);
    assert!(common::meta_text(&job, "error").contains("500"));
    Ok(())
}

#[tokio::test]
async fn transport_errors_fail_the_job() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;
    let id = manager
        .dispatch(
            CallbackWorker::new(vec!["http://127.0.0.1:1/hook".to_string()], json!({})),
            "Notify nobody",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").starts_with("Request to http://127.0.0.1:1/hook failed"));
    Ok(())
}

#[tokio::test]
async fn no_targets_completes_immediately() -> Result<(), Box<dyn Error>> {
    let (manager, queue) = common::setup().await?;
    let id = manager
        .dispatch(
            CallbackWorker::new(Vec::new(), json!({})),
            "Notify nobody",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Complete);
    assert_eq!((job.progress, job.progress_max), (1, 1));
    Ok(())
}
