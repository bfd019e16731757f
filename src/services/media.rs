use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::error::{AnalyzerError, Result};

/// Processing state of a file held by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteFileState {
    Processing,
    Ready,
    Failed,
    Unspecified,
}

/// Server-side reference to an uploaded video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: RemoteFileState,
}

/// Remote store that accepts videos and processes them asynchronously.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads a local file and returns its handle in whatever state the
    /// service reports right after upload.
    async fn submit(&self, path: &Path, mime_type: &str) -> Result<RemoteFile>;

    /// Fetches the current state of a previously submitted file.
    async fn status(&self, name: &str) -> Result<RemoteFile>;
}

/// How long to wait for a remote file to leave the processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 600,
        }
    }
}

fn settle(file: RemoteFile) -> Result<RemoteFile> {
    match file.state {
        RemoteFileState::Ready => Ok(file),
        RemoteFileState::Failed => Err(AnalyzerError::Upload(format!(
            "remote processing of {} failed",
            file.name
        ))),
        RemoteFileState::Unspecified => Err(AnalyzerError::Upload(format!(
            "remote file {} is in an unknown state",
            file.name
        ))),
        RemoteFileState::Processing => Err(AnalyzerError::Upload(format!(
            "remote file {} is still processing",
            file.name
        ))),
    }
}

/// Polls `status` until the file leaves the processing state.
///
/// Checks happen immediately and then every `policy.interval`; after
/// `policy.max_attempts` checks that still report processing the wait
/// fails with [`AnalyzerError::Timeout`].
pub async fn wait_until_ready(
    store: &dyn MediaStore,
    name: &str,
    policy: &PollPolicy,
) -> Result<RemoteFile> {
    let mut attempts = 0u32;
    loop {
        let file = store.status(name).await?;
        attempts += 1;

        if file.state != RemoteFileState::Processing {
            tracing::debug!("📡 {} settled as {:?} after {} checks", name, file.state, attempts);
            return settle(file);
        }

        if attempts >= policy.max_attempts {
            return Err(AnalyzerError::Timeout {
                file: name.to_string(),
                attempts,
            });
        }

        tokio::time::sleep(policy.interval).await;
    }
}

/// Submits a staged file and waits until the remote copy is ready.
pub async fn upload_and_wait(
    store: &dyn MediaStore,
    path: &Path,
    mime_type: &str,
    policy: &PollPolicy,
) -> Result<RemoteFile> {
    let submitted = store.submit(path, mime_type).await?;
    tracing::info!("☁️  Uploaded video as {} ({:?})", submitted.name, submitted.state);

    if submitted.state == RemoteFileState::Processing {
        wait_until_ready(store, &submitted.name, policy).await
    } else {
        settle(submitted)
    }
}
