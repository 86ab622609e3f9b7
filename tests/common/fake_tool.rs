//! In-process fetch tool serving canned archives

use async_trait::async_trait;
use genbank_dl::{FetchTool, Result, TransferStatus};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

/// Serves archives from memory instead of the network
///
/// Names listed as failing leave a truncated partial file behind and report
/// exit code 8, like `wget` on a server error.
#[derive(Default)]
pub struct FakeFetchTool {
    archives: HashMap<String, Vec<u8>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetchTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for URLs ending in `/name`
    pub fn with_archive(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.archives.insert(name.to_string(), bytes);
        self
    }

    /// Make transfers of `name` fail until [`FakeFetchTool::recover`] is called
    pub fn failing(self, name: &str) -> Self {
        self.failing
            .lock()
            .expect("lock poisoned")
            .insert(name.to_string());
        self
    }

    pub fn recover(&self, name: &str) {
        self.failing.lock().expect("lock poisoned").remove(name);
    }

    /// URLs requested so far, in request order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl FetchTool for FakeFetchTool {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<TransferStatus> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(url.to_string());

        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        let dest = dest_dir.join(&name);
        let failing = self.failing.lock().expect("lock poisoned").contains(&name);

        match self.archives.get(&name) {
            Some(bytes) if failing => {
                tokio::fs::write(&dest, &bytes[..bytes.len() / 2]).await?;
                Ok(TransferStatus::Failed {
                    exit_code: Some(8),
                    message: "Server issued an error response.".to_string(),
                })
            }
            Some(bytes) => {
                tokio::fs::write(&dest, bytes).await?;
                Ok(TransferStatus::Succeeded)
            }
            None => Ok(TransferStatus::Failed {
                exit_code: Some(8),
                message: "404 Not Found".to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
