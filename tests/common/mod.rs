#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use video_summarizer::config::AnalyzerConfig;
use video_summarizer::services::agent::{
    AgentRegistry, AgentSettings, GenerativeModel, RemoteServices, ServiceConnector,
};
use video_summarizer::services::credentials::{Credential, InteractiveCredentials};
use video_summarizer::services::error::{AnalyzerError, Result};
use video_summarizer::services::media::{MediaStore, PollPolicy, RemoteFile, RemoteFileState};
use video_summarizer::services::session::SessionStore;
use video_summarizer::services::staging::StagingArea;
use video_summarizer::services::workflow::AnalysisWorkflow;
use video_summarizer::{AppState, create_app};

pub const API_KEY: &str = "test-key";

/// Remote file store that replays scripted status responses.
#[derive(Default)]
pub struct FakeMedia {
    pub submits: AtomicUsize,
    pub checks: AtomicUsize,
    script: Mutex<VecDeque<RemoteFileState>>,
    pub submitted_paths: Mutex<Vec<(PathBuf, bool)>>,
    /// When set, `submit` parks until the gate is notified.
    gate: Option<Arc<Notify>>,
    pub entered: Notify,
}

impl FakeMedia {
    pub fn scripted(states: Vec<RemoteFileState>) -> Self {
        Self {
            script: Mutex::new(states.into()),
            ..Self::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    fn file(state: RemoteFileState) -> RemoteFile {
        RemoteFile {
            name: "files/fake-video".to_string(),
            uri: "https://example.test/files/fake-video".to_string(),
            mime_type: "video/mp4".to_string(),
            state,
        }
    }
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn submit(&self, path: &Path, _mime_type: &str) -> Result<RemoteFile> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted_paths
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        Ok(Self::file(RemoteFileState::Processing))
    }

    async fn status(&self, _name: &str) -> Result<RemoteFile> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let state = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RemoteFileState::Ready);
        Ok(Self::file(state))
    }
}

/// Model that records every prompt it is given.
#[derive(Default)]
pub struct FakeModel {
    pub prompts: Mutex<Vec<String>>,
    fail: bool,
    reject_key: bool,
}

impl FakeModel {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answers every call as if the API key had been revoked.
    pub fn rejecting() -> Self {
        Self {
            reject_key: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerativeModel for FakeModel {
    async fn generate(&self, prompt: &str, attachments: &[RemoteFile]) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.reject_key {
            return Err(AnalyzerError::CredentialRejected("403 Forbidden".to_string()));
        }
        if self.fail {
            return Err(AnalyzerError::Analysis("model unavailable".to_string()));
        }
        assert_eq!(attachments.len(), 1);
        Ok("- first key point\n- second key point".to_string())
    }
}

pub struct FakeConnector {
    pub media: Arc<FakeMedia>,
    pub model: Arc<FakeModel>,
    pub connects: AtomicUsize,
}

impl ServiceConnector for FakeConnector {
    fn connect(&self, _settings: &AgentSettings, _credential: &Credential) -> Result<RemoteServices> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteServices {
            media: self.media.clone(),
            model: self.model.clone(),
        })
    }
}

/// Workflow wired to in-memory fakes and a private staging directory.
pub struct Harness {
    pub dir: TempDir,
    pub media: Arc<FakeMedia>,
    pub model: Arc<FakeModel>,
    pub connector: Arc<FakeConnector>,
    pub workflow: Arc<AnalysisWorkflow>,
}

impl Harness {
    pub fn new(media: FakeMedia, model: FakeModel) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = Arc::new(media);
        let model = Arc::new(model);
        let connector = Arc::new(FakeConnector {
            media: media.clone(),
            model: model.clone(),
            connects: AtomicUsize::new(0),
        });
        let settings = AgentSettings {
            name: "Video Analyzer".to_string(),
            model_id: "gemini-2.0-flash-exp".to_string(),
            markdown: false,
            search_timeout: Duration::from_millis(50),
        };
        let registry = Arc::new(AgentRegistry::new(settings, connector.clone(), None));
        let workflow = Arc::new(AnalysisWorkflow::new(
            StagingArea::new(dir.path()),
            registry,
            Arc::new(InteractiveCredentials),
            PollPolicy {
                interval: Duration::from_millis(1),
                max_attempts: 5,
            },
            1024 * 1024,
        ));

        Self {
            dir,
            media,
            model,
            connector,
            workflow,
        }
    }

    pub fn ready() -> Self {
        Self::new(FakeMedia::default(), FakeModel::default())
    }

    /// Number of files currently sitting in the staging directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.dir.path()).unwrap().count()
    }

    pub fn config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            staging_dir: self.dir.path().to_path_buf(),
            max_file_size: 1024 * 1024,
            ..AnalyzerConfig::development()
        }
    }

    pub fn app(&self) -> (Router, Arc<SessionStore>) {
        let sessions = Arc::new(SessionStore::new());
        let state = AppState {
            config: self.config(),
            workflow: self.workflow.clone(),
            sessions: sessions.clone(),
        };
        (create_app(state), sessions)
    }
}

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// Hand-built multipart body with text fields and an optional video part.
pub fn multipart_body(fields: &[(&str, &str)], video: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = video {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
