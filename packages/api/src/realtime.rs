//! Real-time event streaming via Server-Sent Events.
//!
//! The manager publishes lifecycle events on a broadcast channel and
//! `GET /api/jobs/events` streams them as SSE frames. The job records stay
//! the source of truth, so a client that misses frames just polls.

use std::convert::Infallible;

use actors::JobManager;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{Stream, StreamExt};
use jobs_core::JobEvent;
use tokio::sync::broadcast;

pub const EVENTS_PATH: &str = "/api/jobs/events";

/// Route serving the event stream, to merge into the server router.
pub fn events_router(manager: JobManager) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(job_events))
        .with_state(manager)
}

/// `text/event-stream` response following the manager's events.
pub async fn job_events(State(manager): State<JobManager>) -> Response {
    tracing::debug!("SSE subscriber connected");
    event_stream_response(manager.subscribe())
}

fn event_stream_response(rx: broadcast::Receiver<JobEvent>) -> Response {
    let body = Body::from_stream(sse_stream(rx).map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Name used for the SSE `event:` field.
pub fn event_name(event: &JobEvent) -> &'static str {
    match event {
        JobEvent::Dispatched { .. } => "dispatched",
        JobEvent::Started { .. } => "started",
        JobEvent::Progress { .. } => "progress",
        JobEvent::Completed { .. } => "completed",
        JobEvent::Failed { .. } => "failed",
        JobEvent::Stopped { .. } => "stopped",
        JobEvent::CancelRequested { .. } => "cancel_requested",
        JobEvent::Deleted { .. } => "deleted",
    }
}

/// Helper to format an event for SSE.
pub fn format_sse_event(event: &JobEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!(
        "id: {}\nevent: {}\ndata: {}\n\n",
        event.job_id(),
        event_name(event),
        json
    )
}

/// SSE frames for every event received on `rx`.
///
/// A lagging receiver skips the events it lost and emits a `lagged`
/// frame so the client knows to refresh. The stream ends when the
/// manager is dropped.
pub fn sse_stream(rx: broadcast::Receiver<JobEvent>) -> impl Stream<Item = String> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => Some((format_sse_event(&event), rx)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("SSE subscriber lagged, {} events dropped", missed);
                Some((format!("event: lagged\ndata: {}\n\n", missed), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::sync::Arc;
    use std::time::Duration;

    use actors::{BufferedQueue, DispatchParams, fn_worker};
    use chrono::Utc;
    use db::{DbConfig, JobRepository};
    use jobs_core::JobId;

    use super::*;

    #[test]
    fn frames_carry_id_name_and_json() {
        let job_id = JobId::new();
        let frame = format_sse_event(&JobEvent::Progress {
            job_id,
            current: 3,
            timestamp: Utc::now(),
        });

        assert!(frame.starts_with(&format!("id: {job_id}\nevent: progress\ndata: {{")));
        assert!(frame.contains("\"current\":3"));
        assert!(frame.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn stream_reports_lag_and_ends_when_closed() {
        let (tx, rx) = broadcast::channel(1);
        let job_id = JobId::new();
        for _ in 0..3 {
            tx.send(JobEvent::Completed {
                job_id,
                timestamp: Utc::now(),
            })
            .unwrap();
        }
        drop(tx);

        let frames: Vec<String> = sse_stream(rx).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], "event: lagged\ndata: 2\n\n");
        assert!(frames[1].contains("event: completed"));
    }

    #[tokio::test]
    async fn endpoint_streams_a_frame_per_dispatch() {
        let db = db::connect(&DbConfig::memory()).await.unwrap();
        let manager = JobManager::new(JobRepository::new(db), Arc::new(BufferedQueue::new()));

        let response = job_events(State(manager.clone())).await;
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let id = manager
            .dispatch(
                fn_worker!("noop", |_id, _manager| Ok(())),
                "Streamed",
                DispatchParams::new(),
            )
            .await
            .unwrap();

        let mut body = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with(&format!("id: {id}\nevent: dispatched\ndata: {{")));
    }
}
