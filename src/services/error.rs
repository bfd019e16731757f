use thiserror::Error;

/// Failures of the upload → poll → analyze workflow.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// Missing or unusable credential. `interactive` tells whether the
    /// user was expected to supply it with the request.
    #[error("Configuration error: {message}")]
    Configuration { message: String, interactive: bool },

    #[error("Failed to initialize analysis agent: {0}")]
    Initialization(String),

    #[error("{0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Timed out after {attempts} status checks waiting for {file} to become ready")]
    Timeout { file: String, attempts: u32 },

    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// The remote service refused the API key.
    #[error("API key rejected: {0}")]
    CredentialRejected(String),

    #[error("Staging error: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Session {0} is already processing an analysis")]
    Busy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl AnalyzerError {
    /// Errors raised while talking to the remote service, which are shown
    /// to the user behind a single "Video analysis failed" message.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Upload(_)
                | AnalyzerError::Timeout { .. }
                | AnalyzerError::Analysis(_)
                | AnalyzerError::CredentialRejected(_)
        )
    }

    /// Text shown to the user.
    pub fn user_message(&self) -> String {
        if self.is_remote_failure() {
            format!("Video analysis failed: {}", self)
        } else {
            self.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
