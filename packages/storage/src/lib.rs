//! Artifact storage for files produced by jobs.
//!
//! A thin wrapper around `object_store`: the local filesystem for
//! deployments and dev, memory for tests. Every artifact lives under
//! `jobs/<job id>/<name>`, optionally below a configured prefix.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use jobs_core::JobId;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactBackend {
    Filesystem,
    Memory,
}

impl ArtifactBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactBackend::Filesystem => "filesystem",
            ArtifactBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub backend: ArtifactBackend,
    /// Root directory for the filesystem backend.
    pub root: PathBuf,
    /// Optional key prefix applied to all artifact keys.
    pub prefix: Option<String>,
}

const DEFAULT_ROOT: &str = "./data/artifacts";

impl ArtifactConfig {
    pub fn memory() -> Self {
        Self {
            backend: ArtifactBackend::Memory,
            root: PathBuf::from(DEFAULT_ROOT),
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: ArtifactBackend::Filesystem,
            root: root.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `ARTIFACTS_BACKEND`: `filesystem` (default) or `memory`
    /// - `ARTIFACTS_ROOT`: filesystem root (default: `./data/artifacts`)
    /// - `ARTIFACTS_PREFIX`: optional key prefix
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StorageError> {
        let backend = lookup("ARTIFACTS_BACKEND").and_then(non_empty);
        let prefix = lookup("ARTIFACTS_PREFIX").and_then(non_empty);
        let root = lookup("ARTIFACTS_ROOT")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));

        let cfg = match backend.as_deref() {
            None | Some("filesystem") | Some("fs") => Self::filesystem(root),
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported ARTIFACTS_BACKEND={other} (expected filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// Where a stored artifact lives and how big it is. Workers put this into
/// the job's metadata as `{"file": {"key": ..., "size": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub key: String,
    pub size: u64,
}

impl ArtifactRef {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "key": self.key, "size": self.size })
    }
}

#[derive(Clone)]
pub struct ArtifactStore {
    backend: ArtifactBackend,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("backend", &self.backend)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ArtifactStore {
    pub fn new(cfg: ArtifactConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match cfg.backend {
            ArtifactBackend::Filesystem => {
                ensure_dir(&cfg.root)?;
                Arc::new(object_store::local::LocalFileSystem::new_with_prefix(&cfg.root)?)
            }
            ArtifactBackend::Memory => Arc::new(object_store::memory::InMemory::new()),
        };

        tracing::debug!("Artifact store ready ({})", cfg.backend.as_str());
        Ok(Self {
            backend: cfg.backend,
            store,
            prefix: cfg.prefix.and_then(non_empty),
        })
    }

    pub fn memory() -> Self {
        Self {
            backend: ArtifactBackend::Memory,
            store: Arc::new(object_store::memory::InMemory::new()),
            prefix: None,
        }
    }

    pub fn from_env() -> Result<Self, StorageError> {
        Self::new(ArtifactConfig::from_env()?)
    }

    pub fn backend(&self) -> ArtifactBackend {
        self.backend
    }

    /// The key an artifact of `job` named `name` is stored under.
    pub fn key_for(job: JobId, name: &str) -> Result<String, StorageError> {
        let name = name.trim_matches('/');
        let bad_part = |part: &str| part.is_empty() || part == "." || part == "..";
        if name.is_empty() || name.split('/').any(bad_part) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(format!("jobs/{job}/{name}"))
    }

    fn to_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidName(key.to_string()));
        }

        let joined = match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{key}"),
            _ => key.to_string(),
        };

        Ok(Path::from(joined))
    }

    /// Store `bytes` as the artifact `name` of `job`, replacing any previous
    /// artifact with the same name.
    pub async fn put(
        &self,
        job: JobId,
        name: &str,
        bytes: Bytes,
    ) -> Result<ArtifactRef, StorageError> {
        let key = Self::key_for(job, name)?;
        let size = bytes.len() as u64;
        let path = self.to_path(&key)?;
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;

        tracing::info!("Stored artifact {} ({} bytes) for job {}", key, size, job);
        Ok(ArtifactRef { key, size })
    }

    /// Copy a file from local disk into the store.
    pub async fn put_file(
        &self,
        job: JobId,
        name: &str,
        source: &FsPath,
    ) -> Result<ArtifactRef, StorageError> {
        let bytes = std::fs::read(source)?;
        self.put(job, name, Bytes::from(bytes)).await
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(key)?;
        match self.store.get(&path).await {
            Ok(res) => Ok(res.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an artifact. Removing a missing key is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read back the `{"file": ...}` entry a worker left in job metadata.
    pub fn artifact_from_metadata(
        metadata: &jobs_core::Metadata,
    ) -> Result<Option<ArtifactRef>, StorageError> {
        match metadata.get("file") {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
