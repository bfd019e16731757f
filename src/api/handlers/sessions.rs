use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::AppState;
use crate::api::error::AppError;
use crate::api::handlers::analyze::{AnalyzeResponse, read_video_form};
use crate::services::error::AnalyzerError;
use crate::services::prompt::SummaryStyle;
use crate::services::session::SessionView;

#[derive(Deserialize, ToSchema, Validate)]
pub struct SessionAnalyzeRequest {
    /// Style label; omitted means "Executive Summary".
    pub style: Option<String>,
    #[validate(length(max = 4000, message = "Query exceeds 4000 characters"))]
    pub query: String,
    #[validate(length(max = 512, message = "API key is too long"))]
    pub api_key: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/sessions",
    responses(
        (status = 201, description = "Session created", body = SessionView)
    ),
    tag = "sessions"
)]
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let (id, handle) = state.sessions.create();
    let view = handle.lock().await.view();
    tracing::info!("🆕 Session {} created", id);
    (StatusCode::CREATED, Json(view))
}

#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Current session state", body = SessionView),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Analysis in progress")
    ),
    tag = "sessions"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.try_lock(&id)?;
    Ok(Json(session.view()))
}

#[utoipa::path(
    put,
    path = "/api/sessions/{id}/video",
    params(("id" = String, Path, description = "Session id")),
    request_body(content = Multipart, description = "Field: video (mp4/mov/avi)"),
    responses(
        (status = 200, description = "Video staged", body = SessionView),
        (status = 400, description = "Missing, empty or unsupported video"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Analysis in progress")
    ),
    tag = "sessions"
)]
pub async fn stage_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<SessionView>, AppError> {
    let mut session = state.sessions.try_lock(&id)?;
    let form = read_video_form(multipart).await?;
    let video = form.video.ok_or_else(|| {
        AppError::BadRequest("Please upload a video file to proceed.".to_string())
    })?;

    state.workflow.stage_video(&mut session, video).await?;
    Ok(Json(session.view()))
}

#[utoipa::path(
    post,
    path = "/api/sessions/{id}/analyze",
    params(("id" = String, Path, description = "Session id")),
    request_body = SessionAnalyzeRequest,
    responses(
        (status = 200, description = "Analysis produced", body = AnalyzeResponse),
        (status = 400, description = "No staged video, blank query or missing key"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "Analysis already in progress"),
        (status = 502, description = "Upload or model failure"),
        (status = 504, description = "Remote processing did not finish in time")
    ),
    tag = "sessions"
)]
pub async fn analyze_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SessionAnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    req.validate()?;
    let mut session = state.sessions.try_lock(&id)?;
    let style = SummaryStyle::from_field(req.style.as_deref());

    let result = state
        .workflow
        .analyze(&mut session, style, &req.query, req.api_key.as_deref())
        .await?;

    Ok(Json(result.into()))
}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Unknown session")
    ),
    tag = "sessions"
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let handle = state
        .sessions
        .remove(&id)
        .ok_or_else(|| AnalyzerError::SessionNotFound(id.clone()))?;

    // A running analysis releases its own video when it finishes
    if let Ok(mut session) = handle.try_lock() {
        session.close();
    }
    tracing::info!("🗑️  Session {} removed", id);
    Ok(StatusCode::NO_CONTENT)
}
