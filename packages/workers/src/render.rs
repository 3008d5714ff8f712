//! Headless browser rendering.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use actors::{JobManager, Worker, WorkerError, WorkerFuture, error_metadata, worker_future};
use jobs_core::JobId;
use serde_json::json;
use storage::ArtifactStore;

use crate::metadata;

/// How to run the browser.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Browser executable.
    pub browser: PathBuf,
    /// Page to render.
    pub url: String,
    /// File the browser writes.
    pub output: PathBuf,
    /// Flags placed between the binary and the URL.
    pub flags: Vec<String>,
    /// Per-run profile directories are created below this.
    pub profile_root: PathBuf,
    /// Name of the stored artifact.
    pub artifact_name: String,
    pub timeout: Duration,
}

impl RenderOptions {
    /// Print `url` to a PDF at `output`.
    ///
    /// The browser comes from `CHROMIUM_PATH` (default `/usr/bin/chromium`).
    pub fn pdf(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        let browser = std::env::var("CHROMIUM_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/bin/chromium"));
        let artifact_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "render.pdf".to_string());

        Self {
            browser,
            url: url.into(),
            flags: vec![
                "--headless".to_string(),
                "--disable-gpu".to_string(),
                "--no-sandbox".to_string(),
                "--no-pdf-header-footer".to_string(),
                format!("--print-to-pdf={}", output.display()),
            ],
            output,
            profile_root: std::env::temp_dir().join("render-profiles"),
            artifact_name,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_browser(mut self, browser: impl Into<PathBuf>) -> Self {
        self.browser = browser.into();
        self
    }

    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs the browser once and stores the file it produced.
///
/// Completes with `{"file": {"key", "size"}}`. Preflight problems, a
/// non-zero exit, a timeout or a missing/empty output file fail the job.
#[derive(Debug, Clone)]
pub struct RenderWorker {
    job_id: Option<JobId>,
    options: RenderOptions,
    artifacts: ArtifactStore,
}

impl RenderWorker {
    pub fn new(options: RenderOptions, artifacts: ArtifactStore) -> Self {
        Self {
            job_id: None,
            options,
            artifacts,
        }
    }
}

impl Worker for RenderWorker {
    fn kind(&self) -> &str {
        "render"
    }

    fn assign_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    fn handle(self: Box<Self>, manager: JobManager) -> WorkerFuture {
        let Some(id) = self.job_id else {
            return worker_future(async { Err(WorkerError::msg("worker has no job id")) });
        };
        let RenderWorker {
            options, artifacts, ..
        } = *self;

        worker_future(async move {
            if !manager.start_job(id, 1).await?.is_applied() {
                return Ok(());
            }

            if let Err(error) = preflight(&options).await {
                tracing::error!("Render job {} preflight failed: {}", id, error);
                manager.fail_job(id, error_metadata(error)).await?;
                return Ok(());
            }

            let profile = options.profile_root.join(id.to_string());
            if let Err(e) = tokio::fs::create_dir_all(&profile).await {
                let error = format!("Cannot create temp profile {}: {e}", profile.display());
                manager.fail_job(id, error_metadata(error)).await?;
                return Ok(());
            }

            let rendered = render(&options, &profile).await;
            if let Err(e) = tokio::fs::remove_dir_all(&profile).await {
                tracing::warn!("Could not remove profile {}: {}", profile.display(), e);
            }

            if let Err(error) = rendered {
                tracing::error!("Render job {} failed: {}", id, error);
                manager.fail_job(id, error_metadata(error)).await?;
                return Ok(());
            }

            let artifact = match artifacts
                .put_file(id, &options.artifact_name, &options.output)
                .await
            {
                Ok(artifact) => artifact,
                Err(e) => {
                    let error = format!("Could not store {}: {e}", options.output.display());
                    manager.fail_job(id, error_metadata(error)).await?;
                    return Ok(());
                }
            };

            manager.update_job_state(id, 1, Default::default()).await?;
            manager
                .complete_job(id, metadata(json!({ "file": artifact.to_json() })))
                .await?;
            Ok(())
        })
    }
}

async fn preflight(options: &RenderOptions) -> Result<(), String> {
    if !is_executable(&options.browser).await {
        return Err(format!(
            "Browser binary not found or not executable: {}",
            options.browser.display()
        ));
    }

    let out_dir = match options.output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| format!("Cannot create output dir {}: {e}", out_dir.display()))?;
    let writable = tokio::fs::metadata(&out_dir)
        .await
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false);
    if !writable {
        return Err(format!("Output dir not writable: {}", out_dir.display()));
    }
    Ok(())
}

#[cfg(unix)]
async fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
async fn is_executable(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn render(options: &RenderOptions, profile: &Path) -> Result<(), String> {
    if let Err(e) = tokio::fs::remove_file(&options.output).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::debug!("Could not clear old output {}: {}", options.output.display(), e);
    }

    let mut command = tokio::process::Command::new(&options.browser);
    command
        .args(&options.flags)
        .arg(format!("--user-data-dir={}", profile.display()))
        .arg(&options.url)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    tracing::info!(
        "Launching {} with flags: {}",
        options.browser.display(),
        options.flags.join(" ")
    );

    let output = match tokio::time::timeout(options.timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(format!("Browser could not be started: {e}")),
        Err(_) => {
            return Err(format!(
                "Browser timed out after {}s",
                options.timeout.as_secs_f64()
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
        tracing::warn!("browser[stderr]: {}", line.trim());
    }

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(format!(
            "Browser exit {code}. STDERR: {} STDOUT: {}",
            stderr.trim(),
            stdout.trim()
        ));
    }

    let size = tokio::fs::metadata(&options.output)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(format!(
            "Success reported but output missing/empty at {}",
            options.output.display()
        ));
    }

    tracing::info!("Rendered {} ({} bytes)", options.output.display(), size);
    Ok(())
}
