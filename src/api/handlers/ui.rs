use axum::{Json, extract::State, response::Html};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;
use crate::config::CredentialSource;
use crate::services::prompt::SummaryStyle;

#[derive(Serialize, ToSchema)]
pub struct StyleOption {
    pub label: String,
    pub directive: String,
    pub default: bool,
}

#[derive(Serialize, ToSchema)]
pub struct StylesResponse {
    pub styles: Vec<StyleOption>,
}

#[utoipa::path(
    get,
    path = "/api/styles",
    responses(
        (status = 200, description = "Available summary styles", body = StylesResponse)
    ),
    tag = "analysis"
)]
pub async fn list_styles() -> Json<StylesResponse> {
    let styles = SummaryStyle::ALL
        .iter()
        .map(|style| StyleOption {
            label: style.label().to_string(),
            directive: style.directive().to_string(),
            default: *style == SummaryStyle::default(),
        })
        .collect();
    Json(StylesResponse { styles })
}

fn render_page(agent_name: &str, ask_for_key: bool) -> String {
    let styles: String = SummaryStyle::ALL
        .iter()
        .map(|style| {
            let checked = if *style == SummaryStyle::default() { " checked" } else { "" };
            format!(
                "<label><input type=\"radio\" name=\"style\" value=\"{0}\"{1}> {0}</label><br>\n",
                style.label(),
                checked
            )
        })
        .collect();

    let key_field = if ask_for_key {
        "<p><label>Google API key <input type=\"password\" name=\"api_key\"></label></p>\n"
    } else {
        ""
    };

    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{agent_name}</title></head>
<body>
<h1>{agent_name}</h1>
<p>Upload a video and ask a question about it.</p>
<form action="/api/analyze" method="post" enctype="multipart/form-data">
<p><input type="file" name="video" accept=".mp4,.mov,.avi,video/mp4,video/quicktime,video/x-msvideo"></p>
<fieldset><legend>Summary style</legend>
{styles}</fieldset>
<p><textarea name="query" rows="4" cols="60" placeholder="What insights are you seeking from the video?"></textarea></p>
{key_field}<p><button type="submit">Analyze Video</button></p>
</form>
</body>
</html>
"#
    )
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let ask_for_key = state.config.credential_source == CredentialSource::Interactive;
    Html(render_page(&state.config.agent_name, ask_for_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_lists_styles_with_default_checked() {
        let page = render_page("Video Analyzer", false);
        assert!(page.contains("value=\"Executive Summary\" checked"));
        assert!(page.contains("value=\"Bullet Points\">"));
        assert!(page.contains("value=\"In-depth Narrative\">"));
        assert!(!page.contains("api_key"));
    }

    #[test]
    fn test_page_asks_for_key_when_interactive() {
        assert!(render_page("Video Analyzer", true).contains("name=\"api_key\""));
    }
}
