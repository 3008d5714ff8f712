//! Queue actor holding work until a runner asks for it.

use std::collections::{HashMap, VecDeque};

use jobs_core::JobId;
use ractor::{Actor, ActorProcessingErr, ActorRef, MessagingErr};

use crate::QueuedWork;
use crate::messages::{QueueMessage, QueueStats};

/// State for the queue actor.
#[derive(Debug, Default)]
pub struct QueueActorState {
    /// Runnable work, oldest first.
    pending: VecDeque<Box<QueuedWork>>,
    /// Jobs handed to runners, by runner id.
    running: HashMap<JobId, String>,
    /// Jobs whose runner reported back.
    finished: u64,
}

impl QueueActorState {
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.pending.len() as u64,
            running: self.running.len() as u64,
            finished: self.finished,
        }
    }
}

/// FIFO queue actor.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting queue actor");
        Ok(QueueActorState::default())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Submit { work } => {
                tracing::debug!("Queued job {}", work.job_id);
                state.pending.push_back(work);
            }

            QueueMessage::SubmitAfter { delay, work } => {
                let job_id = work.job_id;
                tracing::debug!("Job {} becomes runnable in {:?}", job_id, delay);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if myself.send_message(QueueMessage::Submit { work }).is_err() {
                        tracing::warn!("Queue stopped before delayed job {} was due", job_id);
                    }
                });
            }

            QueueMessage::RequestWork { runner_id, reply } => {
                let next = state.pending.pop_front();
                if let Some(work) = &next {
                    state.running.insert(work.job_id, runner_id);
                }
                // A runner that gave up waiting leaves the work for the next one.
                if let Err(MessagingErr::SendErr(Some(work))) = reply.send(next) {
                    state.running.remove(&work.job_id);
                    state.pending.push_front(work);
                }
            }

            QueueMessage::WorkFinished { runner_id, job_id } => {
                if state.running.remove(&job_id).is_some() {
                    state.finished += 1;
                }
                tracing::debug!("Runner {} finished job {}", runner_id, job_id);
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }
        }

        Ok(())
    }
}
