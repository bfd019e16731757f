use crate::config::{AnalyzerConfig, CredentialSource};
use crate::services::agent::{AgentRegistry, AgentSettings, GeminiConnector};
use crate::services::credentials::{EnvironmentCredentials, provider_from_config};
use crate::services::search::{DuckDuckGoSearch, SearchTool};
use crate::services::staging::StagingArea;
use crate::services::workflow::AnalysisWorkflow;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared client for every outbound call. No single request may outlive
/// `config.request_timeout()`.
pub fn http_client(config: &AnalyzerConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("video-summarizer/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(30))
        .timeout(config.request_timeout())
        .build()?;
    Ok(client)
}

pub fn setup_search(config: &AnalyzerConfig, http: &reqwest::Client) -> Option<Arc<dyn SearchTool>> {
    if !config.enable_web_search {
        info!("🔎 Web search disabled");
        return None;
    }
    info!("🔎 Web search: {}", config.search_api_base);
    Some(Arc::new(DuckDuckGoSearch::new(
        http.clone(),
        config.search_api_base.clone(),
    )))
}

/// Wires the Gemini connector, agent registry and credential provider
/// into a workflow.
pub fn setup_workflow(
    config: &AnalyzerConfig,
    staging: StagingArea,
) -> anyhow::Result<Arc<AnalysisWorkflow>> {
    let http = http_client(config)?;

    let settings = AgentSettings {
        name: config.agent_name.clone(),
        model_id: config.model_id.clone(),
        markdown: config.markdown,
        search_timeout: config.search_timeout(),
    };
    let connector = Arc::new(GeminiConnector::new(
        http.clone(),
        config.gemini_api_base.clone(),
    ));
    let registry = Arc::new(
        AgentRegistry::new(settings, connector, setup_search(config, &http))
            .with_max_agents(config.max_cached_agents),
    );

    match config.credential_source {
        CredentialSource::Environment => {
            if EnvironmentCredentials::new(&config.api_key_env).is_configured() {
                info!("🔑 Credentials: {} from environment", config.api_key_env);
            } else {
                tracing::warn!(
                    "⚠️  No valid {} found. Please add it to your .env. Analysis requests will be rejected until it is set.",
                    config.api_key_env
                );
            }
        }
        CredentialSource::Interactive => info!("🔑 Credentials: supplied per request"),
    }

    info!(
        "🤖 Agent '{}' using {} at {} (request timeout {:?}, up to {} cached agents)",
        config.agent_name,
        config.model_id,
        config.gemini_api_base,
        config.request_timeout(),
        config.max_cached_agents
    );

    Ok(Arc::new(AnalysisWorkflow::new(
        staging,
        registry,
        provider_from_config(config),
        config.poll_policy(),
        config.max_file_size,
    )))
}
