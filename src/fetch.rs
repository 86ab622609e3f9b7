//! Fetch stage: download archives that are not already present
//!
//! Re-running the stage against the same destination only transfers the
//! archives that are still missing. A failed transfer is reported per
//! archive and its partial file removed, so the next run retries it.

use crate::codec::bgzf::remove_if_exists;
use crate::dispatch::{ExecutionStrategy, TaskDispatcher, spread};
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Result of one transfer attempt as seen by the fetch tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    /// The tool reported success
    Succeeded,
    /// The tool reported failure
    Failed {
        /// Process exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Diagnostic output from the tool
        message: String,
    },
}

/// External program that downloads one URL into a directory
#[async_trait]
pub trait FetchTool: Send + Sync {
    /// Download `url` into `dest_dir`, keeping the remote file name
    ///
    /// # Errors
    ///
    /// Returns an error only when the tool cannot be run at all; transfer
    /// failures are reported through [`TransferStatus::Failed`].
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<TransferStatus>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Fetch tool backed by the `wget` binary
pub struct WgetFetchTool {
    binary_path: PathBuf,
}

impl WgetFetchTool {
    /// Create a tool with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `wget` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("wget").ok().map(Self::new)
    }
}

#[async_trait]
impl FetchTool for WgetFetchTool {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<TransferStatus> {
        let output = Command::new(&self.binary_path)
            .arg(url)
            .arg("-P")
            .arg(dest_dir)
            .arg("-q")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FetchError::Spawn {
                identifier: url.to_string(),
                reason: format!("failed to execute {}: {}", self.binary_path.display(), e),
            })?;

        if output.status.success() {
            Ok(TransferStatus::Succeeded)
        } else {
            Ok(TransferStatus::Failed {
                exit_code: output.status.code(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "wget"
    }
}

/// What happened to one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The file was already on disk
    Skipped {
        /// Remote identifier
        identifier: String,
    },
    /// The file was downloaded
    Transferred {
        /// Remote identifier
        identifier: String,
    },
    /// The download failed; any partial file was removed
    Failed {
        /// Remote identifier
        identifier: String,
        /// Tool exit code, if known
        exit_code: Option<i32>,
        /// Why the transfer is considered failed
        reason: String,
    },
}

/// Totals for one fetch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    /// Archives already present before the run
    pub skipped: Vec<String>,
    /// Archives downloaded by this run
    pub transferred: Vec<String>,
    /// Archives whose download failed
    pub failed: Vec<FetchOutcome>,
}

impl FetchReport {
    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Skipped { identifier } => self.skipped.push(identifier),
            FetchOutcome::Transferred { identifier } => self.transferred.push(identifier),
            failed @ FetchOutcome::Failed { .. } => self.failed.push(failed),
        }
    }

    /// Whether every archive is now on disk
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Downloads missing archives through a [`FetchTool`]
pub struct FetchStage {
    tool: Arc<dyn FetchTool>,
    base_url: String,
    dispatcher: TaskDispatcher,
}

impl FetchStage {
    /// Create a stage resolving identifiers against `base_url`
    pub fn new(tool: Arc<dyn FetchTool>, base_url: impl Into<String>, dispatcher: TaskDispatcher) -> Self {
        Self {
            tool,
            base_url: base_url.into(),
            dispatcher,
        }
    }

    /// Remote URL of an archive
    pub fn url_for(&self, identifier: &str) -> String {
        archive_url(&self.base_url, identifier)
    }

    /// Fetch every identifier not yet present in `dest_dir`
    pub async fn run(&self, identifiers: &[String], dest_dir: &Path) -> Result<FetchReport> {
        tokio::fs::create_dir_all(dest_dir).await?;

        let mut report = FetchReport::default();
        let mut pending = Vec::new();
        for identifier in identifiers {
            if tokio::fs::try_exists(dest_dir.join(identifier)).await? {
                tracing::debug!(identifier = %identifier, "archive already present, skipping");
                report.record(FetchOutcome::Skipped {
                    identifier: identifier.clone(),
                });
            } else {
                pending.push((dest_dir.to_path_buf(), identifier.clone()));
            }
        }

        tracing::info!(
            total = identifiers.len(),
            present = report.skipped.len(),
            pending = pending.len(),
            tool = self.tool.name(),
            "fetching archives"
        );

        let tool = Arc::clone(&self.tool);
        let base_url = self.base_url.clone();
        let worker = spread(move |dir: PathBuf, identifier: String| {
            let tool = Arc::clone(&tool);
            let url = archive_url(&base_url, &identifier);
            async move { fetch_one(tool.as_ref(), &url, &dir, identifier).await }
        });

        let mut outcomes =
            self.dispatcher
                .stream(pending, worker, ExecutionStrategy::PooledMultiArg, true);
        while let Some(outcome) = outcomes.next().await {
            report.record(outcome?);
        }

        if !report.is_complete() {
            tracing::warn!(failed = report.failed.len(), "some archives could not be fetched");
        }
        Ok(report)
    }
}

fn archive_url(base_url: &str, identifier: &str) -> String {
    format!("{}{}", base_url, identifier)
}

/// Destination of an in-progress transfer, removed on drop unless kept
///
/// Runs on a failed transfer and on a fetch future dropped mid-transfer.
struct PartialFile {
    path: PathBuf,
    keep: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = ?self.path, error = %e, "failed to remove partial archive");
        }
    }
}

async fn fetch_one(
    tool: &dyn FetchTool,
    url: &str,
    dest_dir: &Path,
    identifier: String,
) -> Result<FetchOutcome> {
    let dest = PartialFile::new(dest_dir.join(&identifier));
    let status = tool.fetch(url, dest_dir).await?;

    let (exit_code, reason) = match status {
        TransferStatus::Succeeded => {
            if tokio::fs::try_exists(&dest.path).await? {
                tracing::debug!(identifier = %identifier, "archive transferred");
                dest.keep();
                return Ok(FetchOutcome::Transferred { identifier });
            }
            (None, "tool reported success but no file was written".to_string())
        }
        TransferStatus::Failed { exit_code, message } => (exit_code, message),
    };

    tracing::warn!(identifier = %identifier, ?exit_code, reason = %reason, "transfer failed");
    drop(dest);
    Ok(FetchOutcome::Failed {
        identifier,
        exit_code,
        reason,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records requested URLs; writes the file unless the name contains "bad"
    #[derive(Default)]
    struct RecordingTool {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FetchTool for RecordingTool {
        async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<TransferStatus> {
            self.urls.lock().unwrap().push(url.to_string());
            let name = url.rsplit('/').next().unwrap();
            // partial content is left behind on failure, like a dropped transfer
            tokio::fs::write(dest_dir.join(name), b"partial").await?;
            if name.contains("bad") {
                Ok(TransferStatus::Failed {
                    exit_code: Some(8),
                    message: "server error".into(),
                })
            } else {
                Ok(TransferStatus::Succeeded)
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct SilentTool;

    #[async_trait]
    impl FetchTool for SilentTool {
        async fn fetch(&self, _url: &str, _dest_dir: &Path) -> Result<TransferStatus> {
            Ok(TransferStatus::Succeeded)
        }

        fn name(&self) -> &'static str {
            "silent"
        }
    }

    fn stage(tool: Arc<dyn FetchTool>) -> FetchStage {
        let dispatcher = TaskDispatcher::new(2).unwrap().with_progress_display(false);
        FetchStage::new(tool, "https://example.org/genbank/", dispatcher)
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn second_run_transfers_nothing() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(RecordingTool::default());
        let stage = stage(tool.clone());
        let manifest = ids(&["gbbct1.seq.gz", "gbbct2.seq.gz", "gbbct3.seq.gz"]);

        let first = stage.run(&manifest, dir.path()).await.unwrap();
        assert_eq!(first.transferred.len(), 3);
        assert!(first.skipped.is_empty());
        assert_eq!(tool.urls.lock().unwrap().len(), 3);

        let second = stage.run(&manifest, dir.path()).await.unwrap();
        assert_eq!(second.skipped.len(), 3);
        assert!(second.transferred.is_empty());
        assert_eq!(tool.urls.lock().unwrap().len(), 3, "no new transfer calls");
    }

    #[tokio::test]
    async fn urls_are_base_plus_identifier() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(RecordingTool::default());
        stage(tool.clone())
            .run(&ids(&["gbbct7.seq.gz"]), dir.path())
            .await
            .unwrap();
        assert_eq!(
            *tool.urls.lock().unwrap(),
            vec!["https://example.org/genbank/gbbct7.seq.gz".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_transfer_is_reported_and_partial_file_removed() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(RecordingTool::default());
        let report = stage(tool.clone())
            .run(&ids(&["gbbct1.seq.gz", "gbbad2.seq.gz"]), dir.path())
            .await
            .unwrap();

        assert_eq!(report.transferred, vec!["gbbct1.seq.gz".to_string()]);
        assert_eq!(
            report.failed,
            vec![FetchOutcome::Failed {
                identifier: "gbbad2.seq.gz".into(),
                exit_code: Some(8),
                reason: "server error".into(),
            }]
        );
        assert!(!report.is_complete());
        assert!(!dir.path().join("gbbad2.seq.gz").exists());

        // the failed archive is retried on the next run
        let again = stage(tool.clone())
            .run(&ids(&["gbbct1.seq.gz", "gbbad2.seq.gz"]), dir.path())
            .await
            .unwrap();
        assert_eq!(again.skipped, vec!["gbbct1.seq.gz".to_string()]);
        assert_eq!(again.failed.len(), 1);
    }

    #[tokio::test]
    async fn success_without_file_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let report = stage(Arc::new(SilentTool))
            .run(&ids(&["gbbct1.seq.gz"]), dir.path())
            .await
            .unwrap();
        assert!(report.transferred.is_empty());
        assert!(matches!(
            report.failed.as_slice(),
            [FetchOutcome::Failed { exit_code: None, .. }]
        ));
    }

    #[tokio::test]
    async fn missing_binary_aborts_the_run() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(WgetFetchTool::new(PathBuf::from(
            "/nonexistent/genbank-dl/wget-binary",
        )));
        let err = stage(tool)
            .run(&ids(&["gbbct1.seq.gz"]), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Fetch(FetchError::Spawn { .. })));
    }

    #[tokio::test]
    async fn url_for_matches_requested_url() {
        let dir = TempDir::new().unwrap();
        let tool = Arc::new(RecordingTool::default());
        let stage = stage(tool.clone());
        stage.run(&ids(&["gbbct3.seq.gz"]), dir.path()).await.unwrap();
        assert_eq!(
            *tool.urls.lock().unwrap(),
            vec![stage.url_for("gbbct3.seq.gz")]
        );
    }

    /// Shell stand-in for wget: writes half the file, waits, then finishes it
    #[cfg(unix)]
    fn slow_tool(dir: &Path) -> WgetFetchTool {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("slow-wget.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nout=\"$3/$(basename \"$1\")\"\nprintf partial > \"$out\"\nsleep 1\nprintf full >> \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        WgetFetchTool::new(script)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelled_run_kills_the_tool_and_leaves_no_partial_file() {
        let bin = TempDir::new().unwrap();
        let dir = TempDir::new().unwrap();
        let manifest = ids(&["gbbct1.seq.gz"]);
        let dest = dir.path().join("gbbct1.seq.gz");

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            stage(Arc::new(slow_tool(bin.path()))).run(&manifest, dir.path()),
        )
        .await;
        assert!(cancelled.is_err(), "run should still be in progress");

        // outlive the tool's sleep: a surviving child would append and recreate the file
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!dest.exists());

        let resumed = stage(Arc::new(slow_tool(bin.path())))
            .run(&manifest, dir.path())
            .await
            .unwrap();
        assert_eq!(resumed.transferred, manifest);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "partialfull");
    }

    #[test]
    fn from_path_agrees_with_which() {
        assert_eq!(
            which::which("wget").is_ok(),
            WgetFetchTool::from_path().is_some()
        );
    }
}
