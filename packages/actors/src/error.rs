//! Error types for the job runtime.

use db::DbError;

/// Errors returned by [`JobManager`](crate::JobManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Errors from handing work to a queue.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is closed")]
    Closed,

    #[error("Failed to spawn actor: {0}")]
    Spawn(String),

    #[error("Actor error: {0}")]
    Actor(String),
}

/// Errors a worker reports from `handle`.
///
/// The runner turns any of these into a failed job.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Manager(#[from] ManagerError),
}

impl WorkerError {
    pub fn msg(message: impl Into<String>) -> Self {
        WorkerError::Failed(message.into())
    }
}
