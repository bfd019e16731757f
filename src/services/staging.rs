use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::services::error::{AnalyzerError, Result};

/// Every staged video gets this suffix regardless of its container.
pub const STAGED_SUFFIX: &str = ".mp4";

/// A video as received from the client, before it touches the disk.
#[derive(Debug, Clone)]
pub struct UploadedVideo {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedState {
    Created,
    InUse,
    Deleted,
}

/// A scratch copy of an uploaded video.
///
/// The file is removed by [`StagedVideo::release`]; dropping the value
/// releases it as well, so early returns and panics cannot leak it.
#[derive(Debug)]
pub struct StagedVideo {
    path: PathBuf,
    filename: String,
    mime_type: String,
    size: usize,
    state: StagedState,
}

impl StagedVideo {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> StagedState {
        self.state
    }

    pub fn mark_in_use(&mut self) {
        if self.state == StagedState::Created {
            self.state = StagedState::InUse;
        }
    }

    /// Deletes the scratch file. Safe to call more than once.
    pub fn release(&mut self) {
        if self.state == StagedState::Deleted {
            return;
        }
        if let Err(e) = release(&self.path) {
            tracing::warn!("Failed to remove staged video {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("🧹 Released staged video {}", self.path.display());
        }
        self.state = StagedState::Deleted;
    }
}

impl Drop for StagedVideo {
    fn drop(&mut self) {
        self.release();
    }
}

/// Removes a file, treating an already missing file as success.
pub fn release(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Scratch directory where uploads are written before being sent on.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Writes the video to a fresh, uniquely named file.
    pub async fn stage(&self, video: &UploadedVideo) -> Result<StagedVideo> {
        if video.bytes.is_empty() {
            return Err(AnalyzerError::Validation(
                "The uploaded video is empty".to_string(),
            ));
        }

        let dir = self.dir.clone();
        let bytes = video.bytes.clone();
        let path = tokio::task::spawn_blocking(move || -> io::Result<PathBuf> {
            let mut file = tempfile::Builder::new()
                .prefix("video-")
                .suffix(STAGED_SUFFIX)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            file.into_temp_path().keep().map_err(|e| e.error)
        })
        .await
        .map_err(io::Error::other)??;

        tracing::debug!(
            "📼 Staged {} ({} bytes) at {}",
            video.filename,
            video.bytes.len(),
            path.display()
        );

        Ok(StagedVideo {
            path,
            filename: video.filename.clone(),
            mime_type: video.mime_type.clone(),
            size: video.bytes.len(),
            state: StagedState::Created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_video(bytes: &'static [u8]) -> UploadedVideo {
        UploadedVideo {
            filename: "clip.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn test_stage_then_release_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());

        let mut staged = area.stage(&dummy_video(b"0123456789")).await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
        assert_eq!(path.extension().unwrap(), "mp4");
        assert_eq!(staged.state(), StagedState::Created);

        staged.release();
        assert!(!path.exists());
        assert_eq!(staged.state(), StagedState::Deleted);

        // Second release is a no-op
        staged.release();
        assert_eq!(staged.state(), StagedState::Deleted);
    }

    #[tokio::test]
    async fn test_each_stage_gets_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let a = area.stage(&dummy_video(b"a")).await.unwrap();
        let b = area.stage(&dummy_video(b"b")).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_drop_releases_file() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let path = {
            let staged = area.stage(&dummy_video(b"data")).await.unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let err = area.stage(&dummy_video(b"")).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_release_missing_path_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let never_created = dir.path().join("never-created.mp4");
        assert!(release(&never_created).is_ok());
    }

    #[tokio::test]
    async fn test_release_after_external_delete() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let mut staged = area.stage(&dummy_video(b"data")).await.unwrap();
        std::fs::remove_file(staged.path()).unwrap();
        staged.release();
        assert_eq!(staged.state(), StagedState::Deleted);
    }
}
