//! HTTP callbacks.

use std::time::Duration;

use actors::{JobManager, Worker, WorkerError, WorkerFuture, error_metadata, worker_future};
use jobs_core::JobId;
use serde_json::{Value, json};

use crate::metadata;

/// POSTs one JSON payload to each target URL in order.
///
/// Progress advances once per delivered request. The first transport
/// error or non-2xx response fails the job; later targets are not tried.
#[derive(Debug, Clone)]
pub struct CallbackWorker {
    job_id: Option<JobId>,
    targets: Vec<String>,
    payload: Value,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl CallbackWorker {
    pub fn new(targets: Vec<String>, payload: Value) -> Self {
        Self {
            job_id: None,
            targets,
            payload,
            bearer_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Per-request timeout. Defaults to 30 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }
}

impl Worker for CallbackWorker {
    fn kind(&self) -> &str {
        "callback"
    }

    fn assign_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture {
        let Some(id) = self.job_id else {
            return worker_future(async { Err(WorkerError::msg("worker has no job id")) });
        };
        let CallbackWorker {
            targets,
            payload,
            bearer_token,
            timeout,
            ..
        } = *self;

        worker_future(async move {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| WorkerError::msg(format!("Could not build HTTP client: {e}")))?;

            if !manager.start_job(id, targets.len() as u64).await?.is_applied() {
                return Ok(());
            }

            let total = targets.len();
            for (sent, target) in targets.iter().enumerate() {
                if manager.check_if_canceled(id).await? {
                    let message = format!("Stopped after {sent} of {total} requests.");
                    manager
                        .cancel_job(id, metadata(json!({ "message": message })))
                        .await?;
                    return Ok(());
                }

                let delivered = post(&client, target, &payload, bearer_token.as_deref()).await;
                if let Err(message) = delivered {
                    tracing::error!("Callback job {} failed: {}", id, message);
                    manager.fail_job(id, error_metadata(message)).await?;
                    return Ok(());
                }

                let outcome = manager
                    .update_job_state(id, sent as u64 + 1, Default::default())
                    .await?;
                if !outcome.is_applied() {
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

async fn post(
    client: &reqwest::Client,
    target: &str,
    payload: &Value,
    bearer_token: Option<&str>,
) -> Result<(), String> {
    let mut request = client.post(target).json(payload);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| format!("Request to {target} failed: {e}"))?;

    let status = response.status();
    if status.is_success() {
        tracing::debug!("Delivered callback to {} ({})", target, status);
        Ok(())
    } else {
        Err(format!("{target} answered {status}"))
    }
}
