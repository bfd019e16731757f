//! Gemini REST client: resumable file uploads, file status lookups and
//! `generateContent` calls.

use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::services::agent::GenerativeModel;
use crate::services::error::{AnalyzerError, Result};
use crate::services::media::{MediaStore, RemoteFile, RemoteFileState};

const API_VERSION: &str = "v1beta";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
}

impl From<GeminiFile> for RemoteFile {
    fn from(file: GeminiFile) -> Self {
        let state = match file.state.as_deref() {
            Some("PROCESSING") => RemoteFileState::Processing,
            Some("ACTIVE") => RemoteFileState::Ready,
            Some("FAILED") => RemoteFileState::Failed,
            _ => RemoteFileState::Unspecified,
        };
        RemoteFile {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type,
            state,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model_id: String,
    auth: HeaderMap,
}

impl GeminiClient {
    pub fn new(
        http: reqwest::Client,
        api_base: &str,
        api_key: &str,
        model_id: &str,
    ) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AnalyzerError::Initialization(
                "API key is empty".to_string(),
            ));
        }
        if model_id.trim().is_empty() {
            return Err(AnalyzerError::Initialization(
                "model identifier is empty".to_string(),
            ));
        }
        let base = url::Url::parse(api_base).map_err(|e| {
            AnalyzerError::Initialization(format!("invalid Gemini API base '{}': {}", api_base, e))
        })?;

        let mut key = HeaderValue::from_str(api_key).map_err(|_| {
            AnalyzerError::Initialization("API key contains invalid characters".to_string())
        })?;
        key.set_sensitive(true);
        let mut auth = HeaderMap::new();
        auth.insert("x-goog-api-key", key);

        Ok(Self {
            http,
            api_base: base.as_str().trim_end_matches('/').to_string(),
            model_id: model_id.trim().trim_start_matches("models/").to_string(),
            auth,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.api_base, API_VERSION, self.model_id
        )
    }
}

/// Builds the error for a failed call. Key problems are reported as
/// [`AnalyzerError::CredentialRejected`] whatever step hit them.
fn classify_failure(
    status: StatusCode,
    body: &str,
    wrap: fn(String) -> AnalyzerError,
) -> AnalyzerError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());
    let message = format!("{} {}", status, detail.trim());

    let key_refused = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || (status == StatusCode::BAD_REQUEST
            && (body.contains("API_KEY_INVALID") || body.contains("API key not valid")));
    if key_refused {
        AnalyzerError::CredentialRejected(message)
    } else {
        wrap(message)
    }
}

async fn failure(response: reqwest::Response, wrap: fn(String) -> AnalyzerError) -> AnalyzerError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_failure(status, &body, wrap)
}

/// Concatenates the text parts of the first candidate.
fn extract_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() { None } else { Some(text) }
}

#[async_trait]
impl MediaStore for GeminiClient {
    async fn submit(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video.mp4".to_string());

        let start = self
            .http
            .post(format!("{}/upload/{}/files", self.api_base, API_VERSION))
            .headers(self.auth.clone())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| AnalyzerError::Upload(e.to_string()))?;

        if !start.status().is_success() {
            return Err(failure(start, AnalyzerError::Upload).await);
        }

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AnalyzerError::Upload("missing resumable upload URL".to_string()))?;

        let finished = self
            .http
            .post(upload_url)
            .headers(self.auth.clone())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AnalyzerError::Upload(e.to_string()))?;

        if !finished.status().is_success() {
            return Err(failure(finished, AnalyzerError::Upload).await);
        }

        let uploaded: UploadResponse = finished
            .json()
            .await
            .map_err(|e| AnalyzerError::Upload(format!("malformed upload response: {}", e)))?;
        Ok(uploaded.file.into())
    }

    async fn status(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .http
            .get(format!("{}/{}/{}", self.api_base, API_VERSION, name))
            .headers(self.auth.clone())
            .send()
            .await
            .map_err(|e| AnalyzerError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failure(response, AnalyzerError::Upload).await);
        }

        let file: GeminiFile = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Upload(format!("malformed file status: {}", e)))?;
        Ok(file.into())
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str, attachments: &[RemoteFile]) -> Result<String> {
        let mut parts: Vec<Value> = attachments
            .iter()
            .map(|file| {
                json!({
                    "file_data": { "mime_type": file.mime_type, "file_uri": file.uri }
                })
            })
            .collect();
        parts.push(json!({ "text": prompt }));

        let response = self
            .http
            .post(self.generate_endpoint())
            .headers(self.auth.clone())
            .json(&json!({ "contents": [{ "role": "user", "parts": parts }] }))
            .send()
            .await
            .map_err(|e| AnalyzerError::Analysis(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failure(response, AnalyzerError::Analysis).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalyzerError::Analysis(format!("malformed response: {}", e)))?;

        extract_text(&body).ok_or_else(|| {
            let reason = body["promptFeedback"]["blockReason"]
                .as_str()
                .map(|r| format!("response blocked ({})", r))
                .unwrap_or_else(|| "model returned no text".to_string());
            AnalyzerError::Analysis(reason)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_key() {
        let err = GeminiClient::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com",
            "   ",
            "gemini-2.0-flash-exp",
        )
        .err()
        .unwrap();
        assert!(matches!(err, AnalyzerError::Initialization(_)));
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = GeminiClient::new(reqwest::Client::new(), "not a url", "key", "gemini")
            .err()
            .unwrap();
        assert!(matches!(err, AnalyzerError::Initialization(_)));
    }

    #[test]
    fn test_generate_endpoint_strips_models_prefix() {
        let client = GeminiClient::new(
            reqwest::Client::new(),
            "https://generativelanguage.googleapis.com/",
            "key",
            "models/gemini-2.0-flash-exp",
        )
        .unwrap();
        assert_eq!(
            client.generate_endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
        );
    }

    #[test]
    fn test_file_state_mapping() {
        let file: GeminiFile = serde_json::from_value(json!({
            "name": "files/abc",
            "uri": "https://example.test/files/abc",
            "mimeType": "video/mp4",
            "state": "ACTIVE"
        }))
        .unwrap();
        let remote: RemoteFile = file.into();
        assert_eq!(remote.state, RemoteFileState::Ready);
        assert_eq!(remote.mime_type, "video/mp4");

        let file: GeminiFile = serde_json::from_value(json!({ "name": "files/x" })).unwrap();
        assert_eq!(RemoteFile::from(file).state, RemoteFileState::Unspecified);
    }

    #[test]
    fn test_refused_keys_are_classified() {
        let err = classify_failure(StatusCode::FORBIDDEN, "{}", AnalyzerError::Analysis);
        assert!(matches!(err, AnalyzerError::CredentialRejected(_)));

        let body = r#"{"error":{"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body, AnalyzerError::Upload);
        match err {
            AnalyzerError::CredentialRejected(message) => {
                assert!(message.starts_with("400"));
                assert!(message.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"quota"}}"#,
            AnalyzerError::Analysis,
        );
        assert!(matches!(err, AnalyzerError::Analysis(ref m) if m.ends_with("quota")));
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello " }, { "text": "world" }] } }]
        });
        assert_eq!(extract_text(&body).as_deref(), Some("Hello world"));
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }
}
