use axum::{Json, extract::Multipart, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::services::agent::AnalysisResult;
use crate::services::prompt::SummaryStyle;
use crate::services::staging::UploadedVideo;
use crate::utils::validation::{resolve_video_mime, sanitize_filename};

#[derive(Serialize, ToSchema)]
pub struct AnalyzeResponse {
    /// Display label of the style that was applied.
    pub style: String,
    /// Model output, markdown formatted when enabled.
    pub result: String,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            style: result.style.label().to_string(),
            result: result.content,
        }
    }
}

/// Fields of the upload form. Only `video` is required here; the query is
/// checked by the workflow so a blank one yields the usual warning.
#[derive(Default)]
pub struct VideoForm {
    pub video: Option<UploadedVideo>,
    pub style: Option<String>,
    pub query: Option<String>,
    pub api_key: Option<String>,
}

pub async fn read_video_form(mut multipart: Multipart) -> Result<VideoForm, AppError> {
    let mut form = VideoForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "video" => {
                let original_filename = field.file_name().unwrap_or("video.mp4").to_string();
                let content_type = field.content_type().map(|s| s.to_string());

                let filename = sanitize_filename(&original_filename)
                    .map_err(|e| AppError::BadRequest(e.message))?;
                let mime_type = resolve_video_mime(&filename, content_type.as_deref())
                    .map_err(|e| AppError::BadRequest(e.message))?;
                let bytes = field.bytes().await?;

                form.video = Some(UploadedVideo {
                    filename,
                    mime_type: mime_type.to_string(),
                    bytes,
                });
            }
            "style" => form.style = Some(field.text().await?),
            "query" => form.query = Some(field.text().await?),
            "api_key" => form.api_key = Some(field.text().await?),
            other => tracing::debug!("Ignoring unexpected form field '{}'", other),
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body(content = Multipart, description = "Fields: video (mp4/mov/avi), style, query, api_key"),
    responses(
        (status = 200, description = "Analysis produced", body = AnalyzeResponse),
        (status = 400, description = "Missing video, unsupported type, blank query or missing key"),
        (status = 502, description = "Upload or model failure"),
        (status = 503, description = "No credential configured or agent unavailable"),
        (status = 504, description = "Remote processing did not finish in time")
    ),
    tag = "analysis"
)]
pub async fn analyze_video(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let form = read_video_form(multipart).await?;
    let video = form.video.ok_or_else(|| {
        AppError::BadRequest("Please upload a video file to proceed.".to_string())
    })?;
    let style = SummaryStyle::from_field(form.style.as_deref());
    let query = form.query.unwrap_or_default();

    let result = state
        .workflow
        .run_once(video, style, &query, form.api_key.as_deref())
        .await?;

    Ok(Json(result.into()))
}
