//! Message types for actor communication.

use std::time::Duration;

use jobs_core::JobId;
use ractor::{ActorRef, RpcReplyPort};

use crate::QueuedWork;

/// Counters reported by the queue actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: u64,
    pub running: u64,
    pub finished: u64,
}

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Accept work for immediate execution.
    Submit { work: Box<QueuedWork> },

    /// Accept work that becomes runnable after `delay`.
    SubmitAfter {
        delay: Duration,
        work: Box<QueuedWork>,
    },

    /// Request the next runnable work for a runner.
    RequestWork {
        runner_id: String,
        reply: RpcReplyPort<Option<Box<QueuedWork>>>,
    },

    /// A runner finished executing a job.
    WorkFinished { runner_id: String, job_id: JobId },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },
}

/// Messages for the RunnerActor.
#[derive(Debug)]
pub enum RunnerMessage {
    /// Heartbeat tick; an idle runner asks the queue for work.
    Heartbeat,

    /// Shutdown the runner.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Get the queue actor.
    GetQueue {
        reply: RpcReplyPort<ActorRef<QueueMessage>>,
    },

    /// Number of runners currently alive.
    RunnerCount { reply: RpcReplyPort<usize> },

    /// Stop the queue and all runners.
    Shutdown,

    /// Periodic tick for housekeeping.
    Tick,
}
