//! Binds the progress poller to dioxus.

use std::time::Duration;

use dioxus::prelude::*;
use jobs_core::{
    Cycle, Job, JobId, Poller, PollerConfig, ProgressBoard, ProgressReport, ProgressSource,
};

/// Progress source backed by the `job_progress` server function.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerProgress;

impl ProgressSource for ServerProgress {
    async fn fetch(&self, ids: Vec<JobId>) -> Result<ProgressReport, String> {
        let ids = ids.iter().map(ToString::to_string).collect();
        api::job_progress(ids).await.map_err(|e| e.to_string())
    }
}

/// Wait on whichever timer the target has.
pub async fn sleep(duration: Duration) {
    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::TimeoutFuture::new(duration.as_millis().min(u32::MAX as u128) as u32)
        .await;

    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}

/// Progress board for `jobs`, kept current while the component is mounted.
///
/// The poller restarts whenever `jobs` changes. Only changeable jobs are
/// requested, and polling backs off while the server keeps failing.
pub fn use_progress_board(jobs: Signal<Vec<Job>>) -> Signal<ProgressBoard> {
    let mut board = use_signal(ProgressBoard::new);

    let _poller = use_resource(move || {
        let initial = ProgressBoard::from_jobs(jobs.read().iter());
        async move {
            board.set(initial.clone());
            Poller::new(ServerProgress, initial, &PollerConfig::default())
                .run(sleep, move |latest, cycle| {
                    if let Cycle::Failed(error) = cycle {
                        tracing::warn!("Progress poll failed: {}", error);
                    }
                    board.set(latest.clone());
                })
                .await;
        }
    });

    board
}
