use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::services::error::AnalyzerError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

fn analyzer_status(err: &AnalyzerError) -> StatusCode {
    match err {
        AnalyzerError::Configuration { interactive: true, .. } => StatusCode::BAD_REQUEST,
        AnalyzerError::Configuration { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AnalyzerError::Initialization(_) => StatusCode::SERVICE_UNAVAILABLE,
        AnalyzerError::Validation(_) => StatusCode::BAD_REQUEST,
        AnalyzerError::Upload(_) | AnalyzerError::Analysis(_) => StatusCode::BAD_GATEWAY,
        AnalyzerError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnalyzerError::CredentialRejected(_) => StatusCode::UNAUTHORIZED,
        AnalyzerError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AnalyzerError::Busy(_) => StatusCode::CONFLICT,
        AnalyzerError::SessionNotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Analyzer(AnalyzerError::Staging(e)) => {
                tracing::error!("Staging error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Analyzer(e) => {
                let status = analyzer_status(&e);
                if status.is_server_error() {
                    tracing::error!("Analysis request failed ({}): {}", status, e);
                } else {
                    tracing::warn!("{}", e);
                }
                (status, e.user_message())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
