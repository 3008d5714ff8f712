//! Core domain types for the background job system.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and Metadata for job records
//! - Caller and DispatchParams for dispatching work
//! - Progress wire types and the client-side progress poller
//! - Events for real-time updates

mod caller;
mod events;
mod job;
pub mod poller;
mod progress;

pub use caller::Caller;
pub use events::JobEvent;
pub use job::{
    DispatchParams, Job, JobId, JobStatus, Metadata, ParseStatusError, decode_metadata,
    encode_metadata,
};
pub use poller::{Backoff, Cycle, Poller, PollerConfig, ProgressBoard, ProgressSource, TrackedJob};
pub use progress::{JobProgress, ProgressReport, render_metadata_block};
