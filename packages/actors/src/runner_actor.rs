//! Runner actor that pulls work from the queue and executes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::messages::{QueueMessage, RunnerMessage};

/// State for the runner actor.
pub struct RunnerActorState {
    pub runner_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub job_timeout: Option<Duration>,
    /// Whether the runner should continue running.
    pub running: bool,
    /// Set while a job executes; the heartbeat task skips its ticks.
    pub busy: Arc<AtomicBool>,
}

/// Runner actor arguments.
pub struct RunnerArgs {
    pub runner_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub poll_interval: Duration,
    pub job_timeout: Option<Duration>,
}

/// Runner actor. Executes one job at a time.
pub struct RunnerActor;

impl Actor for RunnerActor {
    type Msg = RunnerMessage;
    type State = RunnerActorState;
    type Arguments = RunnerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting runner: {}", args.runner_id);

        let busy = Arc::new(AtomicBool::new(false));
        let heartbeat = myself.clone();
        let interval = args.poll_interval;
        let skip = busy.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if skip.load(Ordering::Acquire) {
                    continue;
                }
                if heartbeat.send_message(RunnerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(RunnerActorState {
            runner_id: args.runner_id,
            queue: args.queue,
            job_timeout: args.job_timeout,
            running: true,
            busy,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RunnerMessage::Shutdown => {
                tracing::info!("Shutting down runner: {}", state.runner_id);
                state.running = false;
                myself.stop(None);
            }

            RunnerMessage::Heartbeat => {
                if !state.running {
                    myself.stop(None);
                    return Ok(());
                }

                let result = ractor::rpc::call(
                    &state.queue,
                    |reply| QueueMessage::RequestWork {
                        runner_id: state.runner_id.clone(),
                        reply,
                    },
                    Some(Duration::from_secs(5)),
                )
                .await;

                if let Ok(ractor::rpc::CallResult::Success(Some(work))) = result {
                    let job_id = work.job_id;
                    state.busy.store(true, Ordering::Release);
                    (*work).run(state.job_timeout).await;
                    state.busy.store(false, Ordering::Release);
                    let finished = QueueMessage::WorkFinished {
                        runner_id: state.runner_id.clone(),
                        job_id,
                    };
                    if state.queue.send_message(finished).is_err() {
                        tracing::warn!("Queue gone; runner {} stopping", state.runner_id);
                        myself.stop(None);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use db::{DbConfig, JobRepository};
    use jobs_core::{DispatchParams, Metadata};

    use super::*;
    use crate::{BufferedQueue, JobManager, QueuedWork, fn_worker};

    #[derive(Default)]
    struct Counts {
        requests: AtomicUsize,
        at_finish: Mutex<Option<usize>>,
    }

    /// Hands out one piece of work and counts the requests it receives.
    struct CountingQueue;

    impl Actor for CountingQueue {
        type Msg = QueueMessage;
        type State = (Option<Box<QueuedWork>>, Arc<Counts>);
        type Arguments = (Box<QueuedWork>, Arc<Counts>);

        async fn pre_start(
            &self,
            _myself: ActorRef<Self::Msg>,
            (work, counts): Self::Arguments,
        ) -> Result<Self::State, ActorProcessingErr> {
            Ok((Some(work), counts))
        }

        async fn handle(
            &self,
            _myself: ActorRef<Self::Msg>,
            message: Self::Msg,
            state: &mut Self::State,
        ) -> Result<(), ActorProcessingErr> {
            let (work, counts) = state;
            match message {
                QueueMessage::RequestWork { reply, .. } => {
                    counts.requests.fetch_add(1, Ordering::SeqCst);
                    let _ = reply.send(work.take());
                }
                QueueMessage::WorkFinished { .. } => {
                    let seen = counts.requests.load(Ordering::SeqCst);
                    *counts.at_finish.lock().unwrap() = Some(seen);
                }
                _ => {}
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn heartbeats_do_not_pile_up_behind_a_long_job() {
        let db = db::connect(&DbConfig::memory()).await.unwrap();
        let buffer = Arc::new(BufferedQueue::new());
        let manager = JobManager::new(JobRepository::new(db), buffer.clone());
        manager
            .dispatch(
                fn_worker!("slow", |id, manager| {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    manager.complete_job(id, Metadata::new()).await?;
                    Ok(())
                }),
                "Slow",
                DispatchParams::new(),
            )
            .await
            .unwrap();
        let work = buffer.take_next().unwrap();

        let counts = Arc::new(Counts::default());
        let (queue, _queue_handle) =
            Actor::spawn(None, CountingQueue, (Box::new(work), counts.clone()))
                .await
                .unwrap();
        let args = RunnerArgs {
            runner_id: "runner-test".to_string(),
            queue: queue.clone(),
            poll_interval: Duration::from_millis(10),
            job_timeout: None,
        };
        let (runner, _runner_handle) = Actor::spawn(None, RunnerActor, args).await.unwrap();

        let mut at_finish = None;
        for _ in 0..500 {
            at_finish = *counts.at_finish.lock().unwrap();
            if at_finish.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let at_finish = at_finish.unwrap();

        // About five ticks fit in this window; a backlog from the job would be ~30.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after = counts.requests.load(Ordering::SeqCst) - at_finish;
        assert!(after < 15, "{after} requests right after the job finished");

        runner.stop(None);
        queue.stop(None);
    }
}
