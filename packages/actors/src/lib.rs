//! Job runtime: lifecycle manager, worker contract and the actor queue.
//!
//! # Architecture
//!
//! - `JobManager` - the only writer of job records
//! - `Worker` - a unit of work; receives its job id, then runs once
//! - `JobQueue` - where dispatched workers wait; `ActorQueue` runs them on
//!   ractor runner actors, `BufferedQueue` holds them until drained
//! - `Supervisor` - owns the queue actor and restarts failed runners
//!
//! # Usage
//!
//! ```ignore
//! use actors::{ActorQueue, JobManager, QueueConfig};
//!
//! let queue = ActorQueue::start(QueueConfig::default()).await?;
//! let manager = JobManager::new(repo, Arc::new(queue));
//! let id = manager.dispatch(worker, "Import rows", DispatchParams::new()).await?;
//! ```

mod error;
mod manager;
mod messages;
mod queue;
mod queue_actor;
mod runner_actor;
mod signals;
mod supervisor;
mod worker;

pub use error::{ManagerError, QueueError, WorkerError};
pub use manager::JobManager;
pub use messages::{QueueMessage, QueueStats, RunnerMessage, SupervisorMessage};
pub use queue::{BufferedQueue, JobQueue, QueueConfig, QueuedWork, error_metadata};
pub use queue_actor::QueueActor;
pub use runner_actor::RunnerActor;
pub use signals::CancelSignals;
pub use supervisor::{ActorQueue, Supervisor};
pub use worker::{FnWorker, Worker, WorkerFuture, WorkerResult, worker_future};

pub use db::{JobFilter, WriteOutcome};
pub use jobs_core::{Caller, DispatchParams, JobId, Metadata};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
