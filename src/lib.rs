pub mod api;
pub mod config;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::{AnalyzerConfig, CredentialSource};
use crate::services::credentials::EnvironmentCredentials;
use crate::services::session::SessionStore;
use crate::services::workflow::AnalysisWorkflow;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn,
    routing::{get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::analyze::analyze_video,
        api::handlers::ui::list_styles,
        api::handlers::sessions::create_session,
        api::handlers::sessions::get_session,
        api::handlers::sessions::stage_video,
        api::handlers::sessions::analyze_session,
        api::handlers::sessions::delete_session,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::analyze::AnalyzeResponse,
            api::handlers::sessions::SessionAnalyzeRequest,
            api::handlers::ui::StyleOption,
            api::handlers::ui::StylesResponse,
            api::handlers::health::HealthResponse,
            services::session::SessionView,
            services::session::SessionState,
            services::prompt::SummaryStyle,
        )
    ),
    tags(
        (name = "analysis", description = "One-shot video analysis"),
        (name = "sessions", description = "Stepwise upload and analysis"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AnalyzerConfig,
    pub workflow: Arc<AnalysisWorkflow>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn credentials_configured(&self) -> bool {
        match self.config.credential_source {
            CredentialSource::Environment => {
                EnvironmentCredentials::new(&self.config.api_key_env).is_configured()
            }
            CredentialSource::Interactive => true,
        }
    }
}

fn cors_layer(config: &AnalyzerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Span for one HTTP request, tagged with the id the request id layer assigned.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get(api::middleware::request_id::REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

pub fn create_app(state: AppState) -> Router {
    // Leave room for multipart framing around the video itself
    let body_limit = state.config.max_file_size + 10 * 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::ui::index))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/styles", get(api::handlers::ui::list_styles))
        .route("/api/analyze", post(api::handlers::analyze::analyze_video))
        .route("/api/sessions", post(api::handlers::sessions::create_session))
        .route(
            "/api/sessions/:id",
            get(api::handlers::sessions::get_session)
                .delete(api::handlers::sessions::delete_session),
        )
        .route(
            "/api/sessions/:id/video",
            put(api::handlers::sessions::stage_video),
        )
        .route(
            "/api/sessions/:id/analyze",
            post(api::handlers::sessions::analyze_session),
        )
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        // Inside the request id layer so the span sees the assigned id
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(|request: &axum::http::Request<_>, _span: &Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
