use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use crate::AppState;
use crate::config::CredentialSource;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub credentials: String,
    pub cached_agents: usize,
    pub active_sessions: usize,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let credentials = match state.config.credential_source {
        CredentialSource::Interactive => "per-request",
        CredentialSource::Environment if state.credentials_configured() => "configured",
        CredentialSource::Environment => "missing",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.workflow.registry().settings().model_id.clone(),
        credentials: credentials.to_string(),
        cached_agents: state.workflow.registry().cached_agents(),
        active_sessions: state.sessions.len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
