use std::path::Path;

/// Video containers accepted by the uploader, as (extension, canonical MIME).
pub const ACCEPTED_VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
];

/// Upper bound on the length of a user query, in characters.
pub const MAX_QUERY_LENGTH: usize = 4000;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for crate::services::error::AnalyzerError {
    fn from(err: ValidationError) -> Self {
        crate::services::error::AnalyzerError::Validation(err.message)
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError {
            code: "EMPTY_FILE",
            message: "The uploaded video is empty".to_string(),
        });
    }
    if size > max_size {
        return Err(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        });
    }
    Ok(())
}

/// Normalizes a declared content type to one of the accepted video MIME
/// types, or returns `None` when it is not a supported container.
pub fn normalize_video_mime(content_type: &str) -> Option<&'static str> {
    let parsed: mime::Mime = content_type.trim().parse().ok()?;
    let essence = parsed.essence_str().to_lowercase();

    // Browsers disagree on the names of these containers
    let normalized = match essence.as_str() {
        "video/mov" => "video/quicktime",
        "video/m4v" | "video/x-m4v" => "video/mp4",
        "video/avi" | "video/msvideo" => "video/x-msvideo",
        other => other,
    };

    ACCEPTED_VIDEO_TYPES
        .iter()
        .find(|(_, mime)| *mime == normalized)
        .map(|(_, mime)| *mime)
}

fn mime_for_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();
    ACCEPTED_VIDEO_TYPES
        .iter()
        .find(|(accepted, _)| *accepted == ext)
        .map(|(_, mime)| *mime)
}

/// Resolves the MIME type of an uploaded video from its declared content
/// type, falling back to the filename extension when the browser sent a
/// generic type such as `application/octet-stream`.
pub fn resolve_video_mime(
    filename: &str,
    content_type: Option<&str>,
) -> Result<&'static str, ValidationError> {
    if let Some(mime) = content_type.and_then(normalize_video_mime) {
        return Ok(mime);
    }
    if let Some(mime) = mime_for_extension(filename) {
        return Ok(mime);
    }

    Err(ValidationError {
        code: "INVALID_VIDEO_TYPE",
        message: format!(
            "'{}' is not a supported video. Upload an MP4, MOV or AVI file.",
            filename
        ),
    })
}

/// Sanitizes filename to prevent path traversal and injection attacks
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Get only the filename component (remove any path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        });
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    Ok(sanitized)
}

/// Rejects empty or whitespace-only queries and overly long ones.
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ValidationError {
            code: "EMPTY_QUERY",
            message: "Please enter a query before requesting an analysis.".to_string(),
        });
    }
    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ValidationError {
            code: "QUERY_TOO_LONG",
            message: format!("Query exceeds {} characters", MAX_QUERY_LENGTH),
        });
    }
    Ok(query)
}
