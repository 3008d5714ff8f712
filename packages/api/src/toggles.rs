//! Boolean field toggles for list views.
//!
//! Only the targets listed in [`ToggleTarget`] can be flipped. A request
//! naming anything else is refused before any lookup happens.

use dioxus::prelude::*;
use serde::{Deserialize, Serialize};

/// A toggleable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToggleTarget {
    /// `job.is_canceled`: asks a running job to stop.
    JobCanceled,
}

impl ToggleTarget {
    pub const ALL: [ToggleTarget; 1] = [ToggleTarget::JobCanceled];

    pub fn entity(self) -> &'static str {
        match self {
            ToggleTarget::JobCanceled => "job",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            ToggleTarget::JobCanceled => "is_canceled",
        }
    }

    pub fn parse(entity: &str, field: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|target| target.entity() == entity && target.field() == field)
    }
}

/// Flip a field. Returns the value now stored.
#[post("/api/toggles")]
pub async fn toggle_field(
    entity: String,
    field: String,
    id: String,
    value: bool,
) -> Result<bool, ServerFnError> {
    #[cfg(feature = "server")]
    {
        let state = crate::ensure_initialized()
            .await
            .map_err(|e| ServerFnError::new(format!("Initialization failed: {}", e)))?;

        state
            .toggles
            .toggle(&entity, &field, &id, value)
            .await
            .map_err(ServerFnError::new)
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = (entity, field, id, value);
        Err(ServerFnError::new("Server-only function"))
    }
}

#[cfg(feature = "server")]
mod registry {
    use std::collections::HashMap;
    use std::sync::Arc;

    use actors::{JobId, JobManager};
    use futures_util::future::BoxFuture;

    use super::ToggleTarget;

    type ToggleFuture = BoxFuture<'static, Result<bool, String>>;
    type ToggleHandler = Arc<dyn Fn(String, bool) -> ToggleFuture + Send + Sync>;

    /// Handlers for the toggleable fields.
    #[derive(Clone, Default)]
    pub struct ToggleRegistry {
        handlers: HashMap<ToggleTarget, ToggleHandler>,
    }

    impl std::fmt::Debug for ToggleRegistry {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ToggleRegistry")
                .field("targets", &self.handlers.keys().collect::<Vec<_>>())
                .finish()
        }
    }

    impl ToggleRegistry {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registry with the job fields wired to `manager`.
        pub fn for_jobs(manager: JobManager) -> Self {
            let mut registry = Self::new();
            registry.register(ToggleTarget::JobCanceled, move |id, value| {
                let manager = manager.clone();
                Box::pin(async move {
                    if !value {
                        return Err("a cancel request cannot be withdrawn".to_string());
                    }
                    let id = JobId::parse(&id).map_err(|e| format!("Invalid job ID: {}", e))?;
                    let outcome = manager
                        .request_cancel(id)
                        .await
                        .map_err(|e| e.to_string())?;
                    match outcome {
                        actors::WriteOutcome::Applied(_) => Ok(true),
                        actors::WriteOutcome::Ignored(status) => {
                            Err(format!("job is already {}", status.label()))
                        }
                        actors::WriteOutcome::Missing => Err(format!("job {} not found", id)),
                    }
                })
            });
            registry
        }

        pub fn register<F>(&mut self, target: ToggleTarget, handler: F)
        where
            F: Fn(String, bool) -> ToggleFuture + Send + Sync + 'static,
        {
            self.handlers.insert(target, Arc::new(handler));
        }

        pub fn targets(&self) -> Vec<ToggleTarget> {
            self.handlers.keys().copied().collect()
        }

        /// Flip `entity.field` of record `id` to `value`.
        pub async fn toggle(
            &self,
            entity: &str,
            field: &str,
            id: &str,
            value: bool,
        ) -> Result<bool, String> {
            let handler = ToggleTarget::parse(entity, field)
                .and_then(|target| self.handlers.get(&target))
                .ok_or_else(|| {
                    tracing::warn!("Refused toggle of {}.{}", entity, field);
                    format!("{entity}.{field} is not toggleable")
                })?;
            handler(id.to_string(), value).await
        }
    }

    #[cfg(test)]
    mod tests {
        #![allow(clippy::disallowed_methods)]

        use std::sync::Arc;

        use actors::{BufferedQueue, DispatchParams, fn_worker};
        use db::{DbConfig, JobRepository};
        use jobs_core::JobStatus;

        use super::*;

        async fn manager() -> JobManager {
            let db = db::connect(&DbConfig::memory()).await.unwrap();
            JobManager::new(JobRepository::new(db), Arc::new(BufferedQueue::new()))
        }

        #[tokio::test]
        async fn unknown_targets_are_refused() {
            let registry = ToggleRegistry::for_jobs(manager().await);
            let err = registry
                .toggle("user", "is_admin", "1", true)
                .await
                .unwrap_err();
            assert_eq!(err, "user.is_admin is not toggleable");
            assert!(registry.toggle("job", "status", "1", true).await.is_err());
            let empty = ToggleRegistry::new();
            assert!(empty.toggle("job", "is_canceled", "1", true).await.is_err());
        }

        #[tokio::test]
        async fn cancel_toggle_requests_cancellation() {
            let manager = manager().await;
            let registry = ToggleRegistry::for_jobs(manager.clone());
            let id = manager
                .dispatch(
                    fn_worker!("noop", |_id, _manager| Ok(())),
                    "Toggle me",
                    DispatchParams::new(),
                )
                .await
                .unwrap();

            let id_text = id.to_string();
            let withdraw = registry.toggle("job", "is_canceled", &id_text, false).await;
            assert!(withdraw.is_err());
            let cancel = registry.toggle("job", "is_canceled", &id_text, true).await;
            assert_eq!(cancel, Ok(true));

            let job = manager.get_job(id).await.unwrap().unwrap();
            assert!(job.is_canceled);
            assert_eq!(job.status, JobStatus::Queued);
            assert!(manager.check_if_canceled(id).await.unwrap());
        }
    }
}

#[cfg(feature = "server")]
pub use registry::ToggleRegistry;
