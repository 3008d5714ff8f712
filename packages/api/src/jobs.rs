//! Job server functions.

use dioxus::prelude::*;
use jobs_core::{Job, JobId, ProgressReport};

#[cfg(feature = "server")]
async fn state() -> Result<&'static crate::ServerState, ServerFnError> {
    crate::ensure_initialized()
        .await
        .map_err(|e| ServerFnError::new(format!("Initialization failed: {}", e)))
}

fn parse_id(id: &str) -> Result<JobId, ServerFnError> {
    JobId::parse(id).map_err(|e| ServerFnError::new(format!("Invalid job ID: {}", e)))
}

/// Batched progress query. Unknown or malformed ids are left out of the
/// response; asking for exactly one job also returns its metadata block.
#[post("/api/jobs/progress")]
pub async fn job_progress(ids: Vec<String>) -> Result<ProgressReport, ServerFnError> {
    #[cfg(feature = "server")]
    {
        let ids: Vec<JobId> = ids.iter().filter_map(|id| JobId::parse(id).ok()).collect();
        if ids.is_empty() {
            return Ok(ProgressReport::default());
        }

        state()
            .await?
            .manager
            .progress(&ids)
            .await
            .map_err(|e| ServerFnError::new(format!("Progress query failed: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = ids;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Ask a running job to stop. Returns false when the job had already
/// finished or does not exist.
#[post("/api/jobs/:id/cancel")]
pub async fn request_cancel(id: String) -> Result<bool, ServerFnError> {
    let job_id = parse_id(&id)?;

    #[cfg(feature = "server")]
    {
        let outcome = state()
            .await?
            .manager
            .request_cancel(job_id)
            .await
            .map_err(|e| ServerFnError::new(format!("Failed to cancel job: {}", e)))?;
        Ok(outcome.is_applied())
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = job_id;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Stop a job immediately. Operators only.
#[post("/api/jobs/:id/force-cancel")]
pub async fn force_cancel(id: String) -> Result<bool, ServerFnError> {
    let job_id = parse_id(&id)?;

    #[cfg(feature = "server")]
    {
        let state = state().await?;
        let outcome = state
            .manager
            .force_cancel(job_id, &state.caller)
            .await
            .map_err(|e| ServerFnError::new(format!("Failed to stop job: {}", e)))?;
        Ok(outcome.is_applied())
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = job_id;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Delete job records in bulk. Returns the ids that were removed.
#[post("/api/jobs/delete")]
pub async fn delete_jobs(ids: Vec<String>) -> Result<Vec<JobId>, ServerFnError> {
    let ids = ids
        .iter()
        .map(|id| parse_id(id))
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(feature = "server")]
    {
        state()
            .await?
            .manager
            .delete_jobs(&ids)
            .await
            .map_err(|e| ServerFnError::new(format!("Failed to delete jobs: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = ids;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Get a job by ID.
#[get("/api/jobs/:id")]
pub async fn get_job(id: String) -> Result<Option<Job>, ServerFnError> {
    let job_id = parse_id(&id)?;

    #[cfg(feature = "server")]
    {
        state()
            .await?
            .manager
            .get_job(job_id)
            .await
            .map_err(|e| ServerFnError::new(format!("Database error: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = job_id;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// List jobs, newest first.
#[post("/api/jobs/list")]
pub async fn list_jobs(
    status: Option<String>,
    limit: Option<usize>,
) -> Result<Vec<Job>, ServerFnError> {
    #[cfg(feature = "server")]
    {
        let status = status
            .as_deref()
            .map(str::parse::<jobs_core::JobStatus>)
            .transpose()
            .map_err(|e| ServerFnError::new(e.to_string()))?;

        let filter = actors::JobFilter {
            status,
            limit: Some(limit.unwrap_or(100)),
            ..Default::default()
        };

        state()
            .await?
            .manager
            .list_jobs(&filter)
            .await
            .map_err(|e| ServerFnError::new(format!("Database error: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = (status, limit);
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Dispatch a demo job that counts `seconds` seconds.
#[post("/api/jobs/demo")]
pub async fn dispatch_demo_job(seconds: u64) -> Result<JobId, ServerFnError> {
    #[cfg(feature = "server")]
    {
        let state = state().await?;
        let params = jobs_core::DispatchParams::new()
            .with_count(seconds)
            .by(state.caller.clone());

        state
            .manager
            .dispatch(
                workers::SleepWorker::new(seconds),
                format!("Fake job ({} s)", seconds),
                params,
            )
            .await
            .map_err(|e| ServerFnError::new(format!("Failed to dispatch job: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = seconds;
        Err(ServerFnError::new("Server-only function"))
    }
}

/// Dispatch a job that prints `url` to a PDF and stores it as an artifact.
#[post("/api/jobs/render")]
pub async fn dispatch_render(url: String) -> Result<JobId, ServerFnError> {
    #[cfg(feature = "server")]
    {
        let state = state().await?;
        let output = std::env::temp_dir()
            .join("renders")
            .join(format!("{}.pdf", JobId::new()));
        let worker = workers::RenderWorker::new(
            workers::RenderOptions::pdf(url.clone(), output),
            state.artifacts.clone(),
        );
        let params = jobs_core::DispatchParams::new().by(state.caller.clone());

        state
            .manager
            .dispatch(worker, format!("Render {}", url), params)
            .await
            .map_err(|e| ServerFnError::new(format!("Failed to dispatch job: {}", e)))
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = url;
        Err(ServerFnError::new("Server-only function"))
    }
}
