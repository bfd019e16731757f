use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::agent::AnalysisResult;
use crate::services::error::{AnalyzerError, Result};
use crate::services::prompt::SummaryStyle;
use crate::services::staging::StagedVideo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Staged,
    Processing,
    ResultDisplayed,
    ErrorDisplayed,
}

#[derive(Debug, Clone)]
enum Outcome {
    Result(AnalysisResult),
    Error(String),
}

/// Snapshot of a session for API responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionView {
    pub session_id: String,
    pub state: SessionState,
    pub staged_video: Option<String>,
    pub style: Option<SummaryStyle>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One user's interaction with the analyzer.
#[derive(Debug)]
pub struct Session {
    id: String,
    state: SessionState,
    staged: Option<StagedVideo>,
    outcome: Option<Outcome>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Idle,
            staged: None,
            outcome: None,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn staged_video(&self) -> Option<&StagedVideo> {
        self.staged.as_ref()
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() >= ttl
    }

    /// Idle/Result/Error → Staged. A previously staged video is released.
    pub fn attach_video(&mut self, video: StagedVideo) -> Result<()> {
        if self.state == SessionState::Processing {
            return Err(AnalyzerError::Busy(self.id.clone()));
        }
        if let Some(mut previous) = self.staged.replace(video) {
            previous.release();
        }
        self.outcome = None;
        self.state = SessionState::Staged;
        self.touch();
        Ok(())
    }

    /// Checks the Staged guard without consuming anything.
    pub fn ensure_staged(&self) -> Result<()> {
        match self.state {
            SessionState::Processing => Err(AnalyzerError::Busy(self.id.clone())),
            _ if self.staged.is_none() => Err(AnalyzerError::Validation(
                "Please upload a video file to proceed.".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Staged → Processing, handing the video over to the caller.
    pub fn begin_processing(&mut self) -> Result<StagedVideo> {
        self.ensure_staged()?;
        let video = self.staged.take().ok_or_else(|| {
            AnalyzerError::Validation("Please upload a video file to proceed.".to_string())
        })?;
        self.state = SessionState::Processing;
        self.touch();
        Ok(video)
    }

    /// Processing → ResultDisplayed | ErrorDisplayed.
    pub fn finish(&mut self, outcome: &Result<AnalysisResult>) {
        match outcome {
            Ok(result) => {
                self.outcome = Some(Outcome::Result(result.clone()));
                self.state = SessionState::ResultDisplayed;
            }
            Err(e) => {
                self.outcome = Some(Outcome::Error(e.user_message()));
                self.state = SessionState::ErrorDisplayed;
            }
        }
        self.touch();
    }

    /// Processing → ErrorDisplayed when the request driving the analysis
    /// went away before `finish` was called. No-op in any other state.
    pub fn abandon(&mut self) {
        if self.state != SessionState::Processing {
            return;
        }
        self.outcome = Some(Outcome::Error(
            "Video analysis failed: the request was cancelled before it finished".to_string(),
        ));
        self.state = SessionState::ErrorDisplayed;
        self.touch();
    }

    /// Drops any staged video; used when the session goes away.
    pub fn close(&mut self) {
        if let Some(mut video) = self.staged.take() {
            video.release();
        }
        self.state = SessionState::Idle;
    }

    pub fn view(&self) -> SessionView {
        let (style, result, error) = match &self.outcome {
            Some(Outcome::Result(r)) => (Some(r.style), Some(r.content.clone()), None),
            Some(Outcome::Error(e)) => (None, None, Some(e.clone())),
            None => (None, None, None),
        };
        SessionView {
            session_id: self.id.clone(),
            state: self.state,
            staged_video: self.staged.as_ref().map(|v| v.filename().to_string()),
            style,
            result,
            error,
            created_at: self.created_at,
        }
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Live sessions keyed by id. Each session sits behind its own lock so
/// only one request can drive it at a time.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> (String, SessionHandle) {
        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(Session::new(id.clone())));
        self.sessions.insert(id.clone(), handle.clone());
        (id, handle)
    }

    pub fn get(&self, id: &str) -> Result<SessionHandle> {
        self.sessions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AnalyzerError::SessionNotFound(id.to_string()))
    }

    /// Locks a session without waiting; a session already in use is busy.
    pub fn try_lock(&self, id: &str) -> Result<OwnedMutexGuard<Session>> {
        self.get(id)?
            .try_lock_owned()
            .map_err(|_| AnalyzerError::Busy(id.to_string()))
    }

    pub fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Removes sessions idle for at least `ttl`, releasing their videos.
    /// Sessions that are locked right now are left alone.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|session| session.is_expired(ttl))
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            if let Some((_, handle)) = self.sessions.remove(&id) {
                if let Ok(mut session) = handle.try_lock() {
                    session.close();
                }
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::staging::{StagingArea, UploadedVideo};
    use bytes::Bytes;

    async fn staged(area: &StagingArea) -> StagedVideo {
        area.stage(&UploadedVideo {
            filename: "clip.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            bytes: Bytes::from_static(b"0123456789"),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let mut session = Session::new("s1");
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            session.begin_processing().unwrap_err(),
            AnalyzerError::Validation(_)
        ));

        session.attach_video(staged(&area).await).unwrap();
        assert_eq!(session.state(), SessionState::Staged);

        let video = session.begin_processing().unwrap();
        assert_eq!(session.state(), SessionState::Processing);
        assert!(matches!(
            session.begin_processing().unwrap_err(),
            AnalyzerError::Busy(_)
        ));
        drop(video);

        session.finish(&Ok(AnalysisResult {
            style: SummaryStyle::BulletPoints,
            content: "done".to_string(),
        }));
        assert_eq!(session.state(), SessionState::ResultDisplayed);
        let view = session.view();
        assert_eq!(view.result.as_deref(), Some("done"));
        assert!(view.staged_video.is_none());

        session.attach_video(staged(&area).await).unwrap();
        session.begin_processing().unwrap();
        session.finish(&Err(AnalyzerError::Analysis("quota exceeded".to_string())));
        assert_eq!(session.state(), SessionState::ErrorDisplayed);
        assert_eq!(
            session.view().error.as_deref(),
            Some("Video analysis failed: Analysis failed: quota exceeded")
        );
    }

    #[tokio::test]
    async fn test_abandon_unwedges_processing() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let mut session = Session::new("s1");

        // Nothing to do outside Processing
        session.abandon();
        assert_eq!(session.state(), SessionState::Idle);

        session.attach_video(staged(&area).await).unwrap();
        drop(session.begin_processing().unwrap());
        session.abandon();

        assert_eq!(session.state(), SessionState::ErrorDisplayed);
        assert!(session.view().error.unwrap().contains("cancelled"));
        session.attach_video(staged(&area).await).unwrap();
        assert_eq!(session.state(), SessionState::Staged);
    }

    #[tokio::test]
    async fn test_replacing_video_releases_previous() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let mut session = Session::new("s1");

        let first = staged(&area).await;
        let first_path = first.path().to_path_buf();
        session.attach_video(first).unwrap();
        session.attach_video(staged(&area).await).unwrap();

        assert!(!first_path.exists());
        assert!(session.staged_video().unwrap().path().exists());
    }

    #[tokio::test]
    async fn test_store_try_lock_reports_busy() {
        let store = SessionStore::new();
        let (id, _) = store.create();
        let guard = store.try_lock(&id).unwrap();
        assert!(matches!(store.try_lock(&id).unwrap_err(), AnalyzerError::Busy(_)));
        drop(guard);
        assert!(store.try_lock(&id).is_ok());
        assert!(matches!(
            store.try_lock("missing").unwrap_err(),
            AnalyzerError::SessionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_sweep_releases_expired_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let area = StagingArea::new(dir.path());
        let store = SessionStore::new();
        let (id, handle) = store.create();
        let path = {
            let mut session = handle.lock().await;
            session.attach_video(staged(&area).await).unwrap();
            session.staged_video().unwrap().path().to_path_buf()
        };

        assert_eq!(store.sweep_expired(Duration::from_secs(3600)), 0);
        assert_eq!(store.sweep_expired(Duration::ZERO), 1);
        assert!(store.get(&id).is_err());
        assert!(!path.exists());
    }
}
