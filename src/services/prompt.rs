use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::media::RemoteFile;

const PREAMBLE: &str = "You are a helpful AI model. Analyze the provided video carefully. ";
const CLOSING: &str =
    "Use any context from the video. Present your findings in user-friendly language.";

/// Presentation mode requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SummaryStyle {
    #[default]
    ExecutiveSummary,
    BulletPoints,
    InDepthNarrative,
}

impl SummaryStyle {
    pub const ALL: [SummaryStyle; 3] = [
        SummaryStyle::ExecutiveSummary,
        SummaryStyle::BulletPoints,
        SummaryStyle::InDepthNarrative,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SummaryStyle::ExecutiveSummary => "Executive Summary",
            SummaryStyle::BulletPoints => "Bullet Points",
            SummaryStyle::InDepthNarrative => "In-depth Narrative",
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            SummaryStyle::ExecutiveSummary => {
                "Provide a concise, single-paragraph executive overview."
            }
            SummaryStyle::BulletPoints => {
                "Provide a list of bullet points highlighting the key takeaways."
            }
            SummaryStyle::InDepthNarrative => {
                "Provide a more detailed, narrative-style summary with contextual insights."
            }
        }
    }

    /// Exact match on the display label. Anything else selects the
    /// narrative style.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Executive Summary" => SummaryStyle::ExecutiveSummary,
            "Bullet Points" => SummaryStyle::BulletPoints,
            _ => SummaryStyle::InDepthNarrative,
        }
    }

    /// Style for an optional form field: absent or blank means the default.
    pub fn from_field(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") => SummaryStyle::default(),
            Some(label) => SummaryStyle::from_label(label),
        }
    }
}

/// Builds the analysis prompt for a style and a user query.
pub fn compose(style: SummaryStyle, query: &str) -> String {
    format!(
        "{PREAMBLE}{}\n\nUser Query: {query}\n\n{CLOSING}",
        style.directive()
    )
}

/// A composed prompt together with the ready video it refers to.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    style: SummaryStyle,
    query: String,
    prompt: String,
    attachments: Vec<RemoteFile>,
}

impl AnalysisRequest {
    pub fn new(style: SummaryStyle, query: &str, video: RemoteFile) -> Self {
        Self {
            style,
            query: query.to_string(),
            prompt: compose(style, query),
            attachments: vec![video],
        }
    }

    pub fn style(&self) -> SummaryStyle {
        self.style
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn attachments(&self) -> &[RemoteFile] {
        &self.attachments
    }
}
