//! Supervisor actor owning the queue actor and its runners.

use std::collections::HashMap;
use std::time::Duration;

use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};

use crate::messages::{QueueMessage, QueueStats, RunnerMessage, SupervisorMessage};
use crate::queue_actor::QueueActor;
use crate::runner_actor::{RunnerActor, RunnerArgs};
use crate::{JobQueue, QueueConfig, QueueError, QueuedWork};

/// State for the supervisor actor.
pub struct SupervisorState {
    config: QueueConfig,
    queue: ActorRef<QueueMessage>,
    /// Live runners by actor id.
    runners: HashMap<ActorId, ActorRef<RunnerMessage>>,
    /// Runner counter for unique IDs.
    runner_counter: u64,
    stopping: bool,
}

async fn spawn_runner(
    myself: &ActorRef<SupervisorMessage>,
    state: &mut SupervisorState,
) -> Result<(), ActorProcessingErr> {
    state.runner_counter += 1;
    let args = RunnerArgs {
        runner_id: format!("runner-{}", state.runner_counter),
        queue: state.queue.clone(),
        poll_interval: state.config.poll_interval,
        job_timeout: state.config.job_timeout,
    };

    let (runner, _handle) = Actor::spawn_linked(None, RunnerActor, args, myself.get_cell())
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn runner: {}", e)))?;

    state.runners.insert(runner.get_id(), runner);
    Ok(())
}

/// Supervisor actor. Restarts runners that die.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = QueueConfig;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        config: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting job queue supervisor with {} runners",
            config.concurrency
        );

        let (queue, _handle) = Actor::spawn_linked(None, QueueActor, (), myself.get_cell())
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn queue: {}", e)))?;

        let mut state = SupervisorState {
            config,
            queue,
            runners: HashMap::new(),
            runner_counter: 0,
            stopping: false,
        };

        for _ in 0..state.config.concurrency.max(1) {
            spawn_runner(&myself, &mut state).await?;
        }

        let ticker = myself.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                if ticker.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::GetQueue { reply } => {
                let _ = reply.send(state.queue.clone());
            }

            SupervisorMessage::RunnerCount { reply } => {
                let _ = reply.send(state.runners.len());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down job queue supervisor");
                state.stopping = true;
                for runner in state.runners.values() {
                    let _ = runner.send_message(RunnerMessage::Shutdown);
                }
                state.queue.stop(None);
                myself.stop(None);
            }

            SupervisorMessage::Tick => {
                let stats = ractor::rpc::call(
                    &state.queue,
                    |reply| QueueMessage::GetStats { reply },
                    Some(Duration::from_secs(5)),
                )
                .await;
                if let Ok(ractor::rpc::CallResult::Success(stats)) = stats {
                    tracing::debug!(
                        "Queue: {} pending, {} running, {} finished, {} runners",
                        stats.pending,
                        stats.running,
                        stats.finished,
                        state.runners.len()
                    );
                }
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let (cell, reason) = match message {
            SupervisionEvent::ActorTerminated(cell, _, reason) => (cell, reason),
            SupervisionEvent::ActorFailed(cell, error) => (cell, Some(error.to_string())),
            _ => return Ok(()),
        };

        if cell.get_id() == state.queue.get_id() {
            if !state.stopping {
                tracing::error!("Queue actor terminated: {:?}", reason);
                myself.stop(Some("queue actor terminated".to_string()));
            }
            return Ok(());
        }

        if state.runners.remove(&cell.get_id()).is_some() && !state.stopping {
            tracing::warn!("Runner {} terminated: {:?}; restarting", cell.get_id(), reason);
            spawn_runner(&myself, state).await?;
        }
        Ok(())
    }
}

/// Handle to a running actor-backed queue.
#[derive(Clone)]
pub struct ActorQueue {
    supervisor: ActorRef<SupervisorMessage>,
    queue: ActorRef<QueueMessage>,
}

impl ActorQueue {
    /// Start the supervisor, the queue actor and `config.concurrency` runners.
    pub async fn start(config: QueueConfig) -> Result<Self, QueueError> {
        let (supervisor, _handle) = Actor::spawn(None, Supervisor, config)
            .await
            .map_err(|e| QueueError::Spawn(e.to_string()))?;

        let queue = match ractor::rpc::call(
            &supervisor,
            |reply| SupervisorMessage::GetQueue { reply },
            Some(Duration::from_secs(5)),
        )
        .await
        {
            Ok(ractor::rpc::CallResult::Success(queue)) => queue,
            Ok(_) => return Err(QueueError::Actor("supervisor did not answer".into())),
            Err(e) => return Err(QueueError::Actor(e.to_string())),
        };

        Ok(Self { supervisor, queue })
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        match ractor::rpc::call(
            &self.queue,
            |reply| QueueMessage::GetStats { reply },
            Some(Duration::from_secs(5)),
        )
        .await
        {
            Ok(ractor::rpc::CallResult::Success(stats)) => Ok(stats),
            Ok(_) => Err(QueueError::Actor("queue did not answer".into())),
            Err(_) => Err(QueueError::Closed),
        }
    }

    pub async fn runner_count(&self) -> Result<usize, QueueError> {
        match ractor::rpc::call(
            &self.supervisor,
            |reply| SupervisorMessage::RunnerCount { reply },
            Some(Duration::from_secs(5)),
        )
        .await
        {
            Ok(ractor::rpc::CallResult::Success(count)) => Ok(count),
            Ok(_) => Err(QueueError::Actor("supervisor did not answer".into())),
            Err(_) => Err(QueueError::Closed),
        }
    }

    /// Stop accepting and running work. Pending work is dropped.
    pub fn shutdown(&self) {
        let _ = self.supervisor.send_message(SupervisorMessage::Shutdown);
    }
}

impl JobQueue for ActorQueue {
    fn push(&self, work: QueuedWork) -> Result<(), QueueError> {
        self.queue
            .send_message(QueueMessage::Submit {
                work: Box::new(work),
            })
            .map_err(|_| QueueError::Closed)
    }

    fn later(&self, delay: Duration, work: QueuedWork) -> Result<(), QueueError> {
        self.queue
            .send_message(QueueMessage::SubmitAfter {
                delay,
                work: Box::new(work),
            })
            .map_err(|_| QueueError::Closed)
    }
}
