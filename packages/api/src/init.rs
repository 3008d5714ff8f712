//! Server initialization for the job system.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use actors::{ActorQueue, Caller, JobManager, QueueConfig};
use db::{DbConfig, JobRepository};
use storage::ArtifactStore;
use tokio::sync::OnceCell;

use crate::ToggleRegistry;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// RocksDB directory; in-memory storage when `None`.
    pub db_path: Option<String>,
    pub concurrency: u32,
    pub job_timeout: Option<Duration>,
    /// Delete records of successful jobs instead of keeping them.
    pub simple_mode: bool,
    /// Principal the admin pages act as. Without one, requests are
    /// anonymous and forced cancel is refused.
    pub operator_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let queue = QueueConfig::default();
        Self {
            db_path: None,
            concurrency: queue.concurrency,
            job_timeout: queue.job_timeout,
            simple_mode: false,
            operator_id: None,
        }
    }
}

impl ServerConfig {
    /// Read the config from the environment.
    ///
    /// - `JOBS_DB_PATH`: RocksDB path (default: in-memory)
    /// - `JOBS_CONCURRENCY`: number of runners (default: 4)
    /// - `JOBS_TIMEOUT_SECS`: per-job timeout, `0` disables it (default: 3600)
    /// - `JOBS_SIMPLE_MODE`: `true`/`false` (default: false)
    /// - `JOBS_OPERATOR_ID`: operator identity of the admin pages
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        config.db_path = var("JOBS_DB_PATH");
        config.operator_id = var("JOBS_OPERATOR_ID");

        if let Some(raw) = var("JOBS_CONCURRENCY") {
            config.concurrency = match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(format!("invalid JOBS_CONCURRENCY={raw} (expected > 0)")),
            };
        }
        if let Some(raw) = var("JOBS_TIMEOUT_SECS") {
            let secs = raw
                .parse::<u64>()
                .map_err(|_| format!("invalid JOBS_TIMEOUT_SECS={raw}"))?;
            config.job_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = var("JOBS_SIMPLE_MODE") {
            config.simple_mode = match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "y" => true,
                "0" | "false" | "no" | "n" => false,
                _ => return Err(format!("invalid JOBS_SIMPLE_MODE={raw} (expected true/false)")),
            };
        }

        Ok(config)
    }

    pub fn db_config(&self) -> DbConfig {
        match &self.db_path {
            Some(path) => DbConfig::rocksdb(path.clone()),
            None => DbConfig::memory(),
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::default()
            .with_concurrency(self.concurrency)
            .with_job_timeout(self.job_timeout)
    }

    /// Who server functions act as.
    pub fn caller(&self) -> Caller {
        match &self.operator_id {
            Some(id) => Caller::Operator(id.clone()),
            None => Caller::Anonymous,
        }
    }
}

/// Everything the server functions need, built once.
pub struct ServerState {
    pub manager: JobManager,
    /// Where render jobs store their output.
    pub artifacts: ArtifactStore,
    pub caller: Caller,
    pub toggles: ToggleRegistry,
}

static STATE: OnceCell<ServerState> = OnceCell::const_new();

/// Start the database, the actor queue and the manager.
pub async fn init_job_system(
    config: ServerConfig,
) -> Result<ServerState, Box<dyn Error + Send + Sync>> {
    tracing::info!("Initializing job system...");

    let db = db::init(config.db_config()).await?;
    let artifacts = ArtifactStore::from_env()?;
    let queue = ActorQueue::start(config.queue_config()).await?;
    let manager = JobManager::new(JobRepository::new(db.clone()), Arc::new(queue))
        .simple_job(config.simple_mode);

    tracing::info!(
        "Job system initialized ({} runners, simple mode {})",
        config.concurrency,
        config.simple_mode
    );
    Ok(ServerState {
        toggles: ToggleRegistry::for_jobs(manager.clone()),
        manager,
        artifacts,
        caller: config.caller(),
    })
}

/// The shared server state, initializing it from the environment on first use.
pub async fn ensure_initialized() -> Result<&'static ServerState, String> {
    STATE
        .get_or_try_init(|| async {
            let config = ServerConfig::from_env()?;
            init_job_system(config).await.map_err(|e| e.to_string())
        })
        .await
}
