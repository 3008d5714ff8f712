//! `jobsctl`: run demo jobs against an in-process job system and follow
//! them with the progress poller.

mod args;
mod view;
mod watch;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{ActorQueue, DispatchParams, JobManager, QueueConfig};
use clap::Parser;
use db::{DbConfig, JobRepository};
use jobs_core::{Cycle, PollerConfig, ProgressBoard};
use serde_json::{Map, json};
use tracing_subscriber::EnvFilter;
use workers::{ImportWorker, MemorySink, Row, SleepWorker};

use crate::args::{Cli, Command};

fn demo_rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|n| {
            let mut row = Map::new();
            row.insert("email".to_string(), json!(format!("user{n}@example.com")));
            row.insert("name".to_string(), json!(format!("User {n}")));
            row
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    let db = db::connect(&DbConfig::memory()).await?;
    let queue = ActorQueue::start(QueueConfig::default().with_concurrency(cli.concurrency)).await?;
    let manager =
        JobManager::new(JobRepository::new(db), Arc::new(queue.clone())).simple_job(cli.simple);

    let id = match cli.command {
        Command::Fake { seconds, tick_ms } => {
            let worker = SleepWorker::new(seconds).with_tick(Duration::from_millis(tick_ms));
            manager
                .dispatch(worker, format!("Fake job ({seconds} s)"), DispatchParams::new())
                .await?
        }
        Command::DemoImport { rows, chunk } => {
            let sink = Arc::new(MemorySink::new("email"));
            let worker = ImportWorker::new(demo_rows(rows), sink).with_chunk(chunk);
            manager
                .dispatch(worker, format!("Import {rows} rows"), DispatchParams::new())
                .await?
        }
    };
    tracing::info!("Dispatched job {}", id);

    let Some(job) = manager.get_job(id).await? else {
        return Err(format!("job {id} vanished before polling started").into());
    };

    let interrupt = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, asking job {id} to stop");
            if let Err(e) = interrupt.request_cancel(id).await {
                tracing::warn!("Cancel request for job {} failed: {}", id, e);
            }
        }
    });

    let config = PollerConfig {
        interval: Duration::from_millis(cli.poll_ms),
        ..PollerConfig::default()
    };
    let watched = watch::watch(
        manager.clone(),
        ProgressBoard::from_jobs([&job]),
        &config,
        |board, cycle| match cycle {
            Cycle::Failed(error) => tracing::warn!("Progress poll failed: {}", error),
            Cycle::Updated => println!("{}", view::render_board(board)),
            Cycle::Idle => {}
        },
    )
    .await;

    println!();
    print!("{}", view::status_table(&watched.board));
    for id in &watched.removed {
        println!("{id} finished and was removed");
    }

    queue.shutdown();
    Ok(())
}
