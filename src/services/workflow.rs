use std::sync::Arc;

use uuid::Uuid;

use crate::services::agent::{AgentContext, AgentRegistry, AnalysisResult};
use crate::services::credentials::CredentialProvider;
use crate::services::error::{AnalyzerError, Result};
use crate::services::media::{PollPolicy, upload_and_wait};
use crate::services::prompt::{AnalysisRequest, SummaryStyle};
use crate::services::session::{Session, SessionState};
use crate::services::staging::{StagedVideo, StagingArea, UploadedVideo};
use crate::utils::validation::{validate_file_size, validate_query};

/// Drives one session through staging, upload, polling and analysis.
pub struct AnalysisWorkflow {
    staging: StagingArea,
    registry: Arc<AgentRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    poll: PollPolicy,
    max_file_size: usize,
}

impl AnalysisWorkflow {
    pub fn new(
        staging: StagingArea,
        registry: Arc<AgentRegistry>,
        credentials: Arc<dyn CredentialProvider>,
        poll: PollPolicy,
        max_file_size: usize,
    ) -> Self {
        Self {
            staging,
            registry,
            credentials,
            poll,
            max_file_size,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn credentials(&self) -> &dyn CredentialProvider {
        self.credentials.as_ref()
    }

    /// Writes the upload to scratch storage and attaches it to the session.
    pub async fn stage_video(&self, session: &mut Session, video: UploadedVideo) -> Result<()> {
        if session.state() == SessionState::Processing {
            return Err(AnalyzerError::Busy(session.id().to_string()));
        }
        validate_file_size(video.bytes.len(), self.max_file_size)?;
        let staged = self.staging.stage(&video).await?;
        tracing::info!(
            "📼 Session {} staged {} ({} bytes)",
            session.id(),
            staged.filename(),
            staged.size()
        );
        session.attach_video(staged)
    }

    /// Runs the analysis for the session's staged video.
    ///
    /// A blank query or a missing credential leaves the session in the
    /// Staged state with its video. Once processing starts, the staged
    /// video is released whatever the outcome.
    pub async fn analyze(
        &self,
        session: &mut Session,
        style: SummaryStyle,
        query: &str,
        supplied_key: Option<&str>,
    ) -> Result<AnalysisResult> {
        session.ensure_staged()?;
        let query = validate_query(query)?;
        let credential = self.credentials.resolve(supplied_key)?;
        let context = self.registry.get_or_connect(&credential)?;

        let session_id = session.id().to_string();
        let mut video = session.begin_processing()?;
        let in_flight = InFlight { session };
        tracing::info!(
            "🎬 Session {} analyzing {} as '{}'",
            session_id,
            video.filename(),
            style.label()
        );

        let outcome = self.process(&context, &mut video, style, query).await;
        video.release();

        match &outcome {
            Ok(_) => tracing::info!("✅ Session {} analysis complete", session_id),
            Err(AnalyzerError::CredentialRejected(reason)) => {
                tracing::warn!("Session {} key rejected: {}", session_id, reason);
                self.registry.evict(&credential);
            }
            Err(e) => tracing::warn!("Session {} analysis failed: {}", session_id, e),
        }
        in_flight.finish(&outcome);
        outcome
    }

    async fn process(
        &self,
        context: &AgentContext,
        video: &mut StagedVideo,
        style: SummaryStyle,
        query: &str,
    ) -> Result<AnalysisResult> {
        video.mark_in_use();
        tracing::info!("☁️  Uploading {} to the AI service", video.filename());
        let remote = upload_and_wait(
            context.media.as_ref(),
            video.path(),
            video.mime_type(),
            &self.poll,
        )
        .await?;

        tracing::info!("🧠 Analyzing {}", remote.name);
        let request = AnalysisRequest::new(style, query, remote);
        context.agent.run(&request).await
    }

    /// Full request cycle on a throwaway session.
    pub async fn run_once(
        &self,
        video: UploadedVideo,
        style: SummaryStyle,
        query: &str,
        supplied_key: Option<&str>,
    ) -> Result<AnalysisResult> {
        validate_query(query)?;
        let mut session = Session::new(Uuid::new_v4().to_string());
        self.stage_video(&mut session, video).await?;
        let outcome = self.analyze(&mut session, style, query, supplied_key).await;
        session.close();
        outcome
    }
}

/// Holds a session in Processing. If the future driving the analysis is
/// dropped before `finish`, the session is moved to ErrorDisplayed.
struct InFlight<'a> {
    session: &'a mut Session,
}

impl InFlight<'_> {
    fn finish(self, outcome: &Result<AnalysisResult>) {
        self.session.finish(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.session.state() == SessionState::Processing {
            tracing::warn!("Session {} analysis was cancelled", self.session.id());
            self.session.abandon();
        }
    }
}
