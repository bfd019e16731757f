use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::services::credentials::Credential;
use crate::services::error::Result;
use crate::services::gemini::GeminiClient;
use crate::services::media::{MediaStore, RemoteFile};
use crate::services::prompt::{AnalysisRequest, SummaryStyle};
use crate::services::search::SearchTool;

const MARKDOWN_INSTRUCTION: &str = "Use markdown to format your answers.";

pub const DEFAULT_MAX_AGENTS: usize = 32;

/// A hosted model that answers a prompt about attached files.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str, attachments: &[RemoteFile]) -> Result<String>;
}

/// Text returned by the agent for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub style: SummaryStyle,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub name: String,
    pub model_id: String,
    pub markdown: bool,
    /// Longest the agent waits for the search tool before going on without it.
    pub search_timeout: Duration,
}

pub struct AnalysisAgent {
    settings: AgentSettings,
    model: Arc<dyn GenerativeModel>,
    search: Option<Arc<dyn SearchTool>>,
}

impl AnalysisAgent {
    pub fn new(
        settings: AgentSettings,
        model: Arc<dyn GenerativeModel>,
        search: Option<Arc<dyn SearchTool>>,
    ) -> Self {
        Self {
            settings,
            model,
            search,
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    /// Looks up supplementary context. Search problems never fail the run.
    async fn web_context(&self, query: &str) -> Option<String> {
        let tool = self.search.as_ref()?;
        let lookup = tokio::time::timeout(self.settings.search_timeout, tool.search(query));
        match lookup.await {
            Err(_) => {
                tracing::warn!(
                    "Web search via {} timed out after {:?}, continuing without it",
                    tool.name(),
                    self.settings.search_timeout
                );
                None
            }
            Ok(Ok(snippets)) if !snippets.is_empty() => {
                tracing::debug!("🔎 {} returned {} snippets", tool.name(), snippets.len());
                let lines: Vec<String> = snippets.iter().map(|s| format!("- {}", s)).collect();
                Some(format!(
                    "Supplementary web context ({}):\n{}",
                    tool.name(),
                    lines.join("\n")
                ))
            }
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                tracing::warn!("Web search via {} failed, continuing without it: {}", tool.name(), e);
                None
            }
        }
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        let mut sections = vec![request.prompt().to_string()];
        if let Some(context) = self.web_context(request.query()).await {
            sections.push(context);
        }
        if self.settings.markdown {
            sections.push(MARKDOWN_INSTRUCTION.to_string());
        }
        let prompt = sections.join("\n\n");

        tracing::info!(
            "🤖 {} running {} on {} attachment(s)",
            self.settings.name,
            self.settings.model_id,
            request.attachments().len()
        );
        let content = self.model.generate(&prompt, request.attachments()).await?;

        Ok(AnalysisResult {
            style: request.style(),
            content,
        })
    }
}

/// Remote collaborators bound to a single credential.
pub struct RemoteServices {
    pub media: Arc<dyn MediaStore>,
    pub model: Arc<dyn GenerativeModel>,
}

/// Builds remote clients for a credential.
pub trait ServiceConnector: Send + Sync {
    fn connect(&self, settings: &AgentSettings, credential: &Credential) -> Result<RemoteServices>;
}

pub struct GeminiConnector {
    http: reqwest::Client,
    api_base: String,
}

impl GeminiConnector {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }
}

impl ServiceConnector for GeminiConnector {
    fn connect(&self, settings: &AgentSettings, credential: &Credential) -> Result<RemoteServices> {
        let client = Arc::new(GeminiClient::new(
            self.http.clone(),
            &self.api_base,
            credential.expose(),
            &settings.model_id,
        )?);
        Ok(RemoteServices {
            media: client.clone(),
            model: client,
        })
    }
}

/// An agent plus the media store that shares its credential.
pub struct AgentContext {
    pub agent: AnalysisAgent,
    pub media: Arc<dyn MediaStore>,
}

struct CachedAgent {
    context: Arc<AgentContext>,
    last_used: Instant,
}

/// Memoizes one [`AgentContext`] per configuration key, keeping at most
/// `max_agents` of them. The least recently used one goes first.
pub struct AgentRegistry {
    settings: AgentSettings,
    connector: Arc<dyn ServiceConnector>,
    search: Option<Arc<dyn SearchTool>>,
    agents: DashMap<String, CachedAgent>,
    max_agents: usize,
}

impl AgentRegistry {
    pub fn new(
        settings: AgentSettings,
        connector: Arc<dyn ServiceConnector>,
        search: Option<Arc<dyn SearchTool>>,
    ) -> Self {
        Self {
            settings,
            connector,
            search,
            agents: DashMap::new(),
            max_agents: DEFAULT_MAX_AGENTS,
        }
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents.max(1);
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Fingerprint of everything that affects how an agent is built. The
    /// raw key never ends up in the map.
    fn config_key(&self, credential: &Credential) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.settings.model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(credential.expose().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get_or_connect(&self, credential: &Credential) -> Result<Arc<AgentContext>> {
        let key = self.config_key(credential);
        if let Some(mut existing) = self.agents.get_mut(&key) {
            existing.last_used = Instant::now();
            return Ok(existing.context.clone());
        }

        let services = self.connector.connect(&self.settings, credential)?;
        let context = Arc::new(AgentContext {
            agent: AnalysisAgent::new(self.settings.clone(), services.model, self.search.clone()),
            media: services.media,
        });
        tracing::info!(
            "🧠 Initialized agent '{}' ({})",
            self.settings.name,
            self.settings.model_id
        );

        self.make_room();

        // A concurrent caller may have won the race; keep whichever landed first
        let cached = self.agents.entry(key).or_insert(CachedAgent {
            context,
            last_used: Instant::now(),
        });
        Ok(cached.context.clone())
    }

    fn make_room(&self) {
        while self.agents.len() >= self.max_agents {
            let oldest = self
                .agents
                .iter()
                .min_by_key(|entry| entry.last_used)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.agents.remove(&key);
                    tracing::debug!("♻️  Evicted least recently used agent");
                }
                None => break,
            }
        }
    }

    /// Forgets the agent built for `credential`, e.g. after the remote
    /// service refused the key.
    pub fn evict(&self, credential: &Credential) -> bool {
        self.agents.remove(&self.config_key(credential)).is_some()
    }

    pub fn cached_agents(&self) -> usize {
        self.agents.len()
    }
}
