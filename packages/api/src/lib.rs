//! Server API functions for the job system.
//!
//! This crate contains the shared fullstack server functions for:
//! - Progress queries (the batched poll behind every progress bar)
//! - Cancellation (cooperative request, operator force stop)
//! - Job listing, lookup and bulk delete
//! - Field toggles for list views
//! - Real-time events (`GET /api/jobs/events`, SSE)

mod jobs;
mod toggles;

#[cfg(feature = "server")]
mod init;

#[cfg(feature = "server")]
mod realtime;

// Re-export all server functions
pub use jobs::*;
pub use toggles::*;

#[cfg(feature = "server")]
pub use init::*;

#[cfg(feature = "server")]
pub use realtime::*;

// Re-export core types for convenience
pub use jobs_core::{Job, JobEvent, JobId, JobProgress, JobStatus, ProgressReport};
