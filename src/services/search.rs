use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Web search capability available to the analysis agent.
#[async_trait]
pub trait SearchTool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns text snippets relevant to `query`; an empty list when
    /// nothing useful was found.
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

/// DuckDuckGo instant answer API.
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    api_base: String,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

fn collect_snippets(answer: InstantAnswer, max_results: usize) -> Vec<String> {
    fn walk(topics: Vec<RelatedTopic>, out: &mut Vec<String>) {
        for topic in topics {
            if let Some(text) = topic.text.filter(|t| !t.trim().is_empty()) {
                out.push(text);
            }
            walk(topic.topics, out);
        }
    }

    let mut snippets = Vec::new();
    if !answer.abstract_text.trim().is_empty() {
        snippets.push(answer.abstract_text);
    }
    walk(answer.related_topics, &mut snippets);
    snippets.truncate(max_results);
    snippets
}

#[async_trait]
impl SearchTool for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let answer: InstantAnswer = self
            .http
            .get(format!("{}/", self.api_base))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(collect_snippets(answer, self.max_results))
    }
}
