#![allow(clippy::disallowed_methods)]
#![cfg(unix)]

mod common;

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use actors::DispatchParams;
use jobs_core::JobStatus;
use storage::ArtifactStore;
use workers::{RenderOptions, RenderWorker};

/// `/bin/sh -c <script>` stands in for the browser; the script sees the
/// remaining flags and the URL as its arguments.
fn fake_browser(dir: &Path, script: &str) -> RenderOptions {
    let output = dir.join("out").join("page.pdf");
    let mut options = RenderOptions::pdf("https://example.test/invoice/7", &output)
        .with_browser("/bin/sh")
        .with_profile_root(dir.join("profiles"))
        .with_timeout(Duration::from_secs(5));
    let mut flags = vec!["-c".to_string(), script.to_string(), "fake-browser".to_string()];
    flags.append(&mut options.flags);
    options.flags = flags;
    options
}

const PRINT_PDF: &str = r#"
for arg in "$@"; do
  case "$arg" in
    --print-to-pdf=*) printf '%%PDF-1.4 fake' > "${arg#--print-to-pdf=}" ;;
  esac
done
"#;

#[tokio::test]
async fn rendered_file_is_stored_as_an_artifact() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let artifacts = ArtifactStore::memory();
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            RenderWorker::new(fake_browser(dir.path(), PRINT_PDF), artifacts.clone()),
            "Render invoice",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Complete, "{:?}", job.metadata);
    let artifact = ArtifactStore::artifact_from_metadata(&job.metadata)?
        .ok_or("no file entry")?;
    assert_eq!(artifact.key, format!("jobs/{id}/page.pdf"));
    assert_eq!(artifacts.get(&artifact.key).await?.as_ref(), b"%PDF-1.4 fake");
    assert_eq!(artifact.size, 13);

    // The per-run profile is cleaned up.
    assert!(!dir.path().join("profiles").join(id.to_string()).exists());
    Ok(())
}

#[tokio::test]
async fn a_missing_browser_fails_before_launch() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (manager, queue) = common::setup().await?;
    let options = RenderOptions::pdf("https://example.test", dir.path().join("a.pdf"))
        .with_browser(dir.path().join("no-such-browser"));

    let id = manager
        .dispatch(
            RenderWorker::new(options, ArtifactStore::memory()),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").starts_with("Browser binary not found"));
    Ok(())
}

#[tokio::test]
async fn a_non_zero_exit_fails_with_the_output() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            RenderWorker::new(
                fake_browser(dir.path(), "echo 'no display' >&2; exit 3"),
                ArtifactStore::memory(),
            ),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    let error = common::meta_text(&job, "error");
    assert!(error.starts_with("Browser exit 3"), "{error}");
    assert!(error.contains("no display"), "{error}");
    Ok(())
}

#[tokio::test]
async fn success_without_output_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            RenderWorker::new(fake_browser(dir.path(), "exit 0"), ArtifactStore::memory()),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").contains("missing/empty"));
    Ok(())
}

#[tokio::test]
async fn a_hanging_browser_times_out() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let (manager, queue) = common::setup().await?;
    let options =
        fake_browser(dir.path(), "sleep 10").with_timeout(Duration::from_millis(200));

    let id = manager
        .dispatch(
            RenderWorker::new(options, ArtifactStore::memory()),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").starts_with("Browser timed out"));
    Ok(())
}

#[tokio::test]
async fn a_stale_output_file_does_not_count_as_rendered() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("out"))?;
    std::fs::write(dir.path().join("out").join("page.pdf"), b"%PDF old run")?;
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            RenderWorker::new(fake_browser(dir.path(), "exit 0"), ArtifactStore::memory()),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").contains("missing/empty"));
    Ok(())
}

#[tokio::test]
async fn an_unusable_output_dir_fails_before_launch() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    // A plain file where the output directory should go.
    std::fs::write(dir.path().join("out"), b"")?;
    let (manager, queue) = common::setup().await?;

    let id = manager
        .dispatch(
            RenderWorker::new(fake_browser(dir.path(), PRINT_PDF), ArtifactStore::memory()),
            "Render",
            DispatchParams::new(),
        )
        .await?;
    queue.run_next().await;

    let job = common::job(&manager, id).await;
    assert_eq!(job.status, JobStatus::Error);
    assert!(common::meta_text(&job, "error").starts_with("Cannot create output dir"));
    assert!(!dir.path().join("profiles").join(id.to_string()).exists());
    Ok(())
}
