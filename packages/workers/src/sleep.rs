//! A worker that only waits.

use std::time::Duration;

use actors::{JobManager, Worker, WorkerError, WorkerFuture, worker_future};
use jobs_core::JobId;
use serde_json::json;

use crate::metadata;

/// Counts to `seconds`, one progress update per tick.
///
/// Checks for cancellation every tick and wakes early when the job's
/// cancellation token fires. Stops quietly once its record has been made
/// terminal by someone else (forced cancel, deletion).
#[derive(Debug, Clone)]
pub struct SleepWorker {
    job_id: Option<JobId>,
    seconds: u64,
    tick: Duration,
}

impl SleepWorker {
    pub fn new(seconds: u64) -> Self {
        Self {
            job_id: None,
            seconds,
            tick: Duration::from_secs(1),
        }
    }

    /// Length of one step. Defaults to one second.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }
}

impl Worker for SleepWorker {
    fn kind(&self) -> &str {
        "sleep"
    }

    fn assign_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture {
        let Some(id) = self.job_id else {
            return worker_future(async { Err(WorkerError::msg("worker has no job id")) });
        };
        let SleepWorker { seconds, tick, .. } = *self;

        worker_future(async move {
            if !manager.start_job(id, seconds).await?.is_applied() {
                return Ok(());
            }
            let token = manager.cancellation_token(id);

            for step in 1..=seconds {
                match &token {
                    Some(token) => {
                        tokio::select! {
                            _ = tokio::time::sleep(tick) => {}
                            _ = token.cancelled() => {}
                        }
                    }
                    None => tokio::time::sleep(tick).await,
                }

                if manager.check_if_canceled(id).await? {
                    let done = step - 1;
                    manager
                        .cancel_job(
                            id,
                            metadata(json!({
                                "message": format!("Stopped after {done} of {seconds} steps."),
                            })),
                        )
                        .await?;
                    return Ok(());
                }

                let outcome = manager
                    .update_job_state(id, step, Default::default())
                    .await?;
                if !outcome.is_applied() {
                    tracing::debug!("Sleep job {} no longer live, stopping", id);
                    return Ok(());
                }
            }

            manager
                .complete_job(id, metadata(json!({ "message": "All finished." })))
                .await?;
            Ok(())
        })
    }
}
