use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::media::PollPolicy;

/// Where the Gemini API key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read once per request from a process environment variable.
    Environment,
    /// Supplied by the user alongside each analysis request.
    Interactive,
}

impl CredentialSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "environment" | "env" => Some(Self::Environment),
            "interactive" | "user" => Some(Self::Interactive),
            _ => None,
        }
    }
}

/// Runtime configuration for the analyzer service
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Maximum accepted video size in bytes (default: 1 GB)
    pub max_file_size: usize,

    /// Directory that holds staged videos (default: OS temp dir)
    pub staging_dir: PathBuf,

    /// Gemini model identifier (default: "gemini-2.0-flash-exp")
    pub model_id: String,

    /// Base URL of the Gemini REST API
    pub gemini_api_base: String,

    /// Display name of the analysis agent
    pub agent_name: String,

    /// Ask the model to format answers as Markdown (default: true)
    pub markdown: bool,

    /// Give the agent access to the web search tool (default: true)
    pub enable_web_search: bool,

    /// Base URL of the DuckDuckGo instant answer API
    pub search_api_base: String,

    /// Longest wait for a web search before analysis goes on without it (default: 10 s)
    pub search_timeout_secs: u64,

    /// Overall limit for a single outbound HTTP request (default: 300 s)
    pub request_timeout_secs: u64,

    /// Most agents kept alive at once, one per distinct API key (default: 32)
    pub max_cached_agents: usize,

    /// Delay between remote file status checks (default: 1000 ms)
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a remote file to become ready (default: 600 s)
    pub poll_timeout_secs: u64,

    /// Credential provider selection (default: environment)
    pub credential_source: CredentialSource,

    /// Environment variable holding the API key (default: "GOOGLE_API_KEY")
    pub api_key_env: String,

    /// Idle sessions older than this are swept (default: 1800 s)
    pub session_ttl_secs: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024 * 1024, // 1 GB
            staging_dir: env::temp_dir(),
            model_id: "gemini-2.0-flash-exp".to_string(),
            gemini_api_base: "https://generativelanguage.googleapis.com".to_string(),
            agent_name: "Video Analyzer".to_string(),
            markdown: true,
            enable_web_search: true,
            search_api_base: "https://api.duckduckgo.com".to_string(),
            search_timeout_secs: 10,
            request_timeout_secs: 300,
            max_cached_agents: 32,
            poll_interval_ms: 1000,
            poll_timeout_secs: 600,
            credential_source: CredentialSource::Environment,
            api_key_env: "GOOGLE_API_KEY".to_string(),
            session_ttl_secs: 30 * 60,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            staging_dir: env::var("STAGING_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            model_id: env::var("GEMINI_MODEL").unwrap_or(default.model_id),

            gemini_api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default.gemini_api_base),

            agent_name: env::var("AGENT_NAME").unwrap_or(default.agent_name),

            markdown: env::var("AGENT_MARKDOWN")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.markdown),

            enable_web_search: env::var("ENABLE_WEB_SEARCH")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.enable_web_search),

            search_api_base: env::var("SEARCH_API_BASE")
                .ok()
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default.search_api_base),

            search_timeout_secs: env::var("SEARCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.search_timeout_secs),

            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.request_timeout_secs),

            max_cached_agents: env::var("MAX_CACHED_AGENTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.max_cached_agents),

            poll_interval_ms: env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.poll_interval_ms),

            poll_timeout_secs: env::var("POLL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.poll_timeout_secs),

            credential_source: env::var("CREDENTIAL_SOURCE")
                .ok()
                .and_then(|v| CredentialSource::parse(&v))
                .unwrap_or(default.credential_source),

            api_key_env: env::var("API_KEY_ENV").unwrap_or(default.api_key_env),

            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.session_ttl_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (interactive keys, no web search, fast polling)
    pub fn development() -> Self {
        Self {
            enable_web_search: false,
            poll_interval_ms: 200,
            poll_timeout_secs: 120,
            credential_source: CredentialSource::Interactive,
            ..Self::default()
        }
    }

    /// Poll policy derived from the interval and timeout settings.
    pub fn poll_policy(&self) -> PollPolicy {
        let interval = Duration::from_millis(self.poll_interval_ms.max(1));
        let max_attempts = (self.poll_timeout_secs.saturating_mul(1000)
            / self.poll_interval_ms.max(1))
        .max(1);
        PollPolicy {
            interval,
            max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.max_file_size, 1024 * 1024 * 1024);
        assert_eq!(config.model_id, "gemini-2.0-flash-exp");
        assert_eq!(config.credential_source, CredentialSource::Environment);
        assert_eq!(config.api_key_env, "GOOGLE_API_KEY");
        assert!(config.markdown);
    }

    #[test]
    fn test_development_config() {
        let config = AnalyzerConfig::development();
        assert!(!config.enable_web_search);
        assert_eq!(config.credential_source, CredentialSource::Interactive);
    }

    #[test]
    fn test_poll_policy_is_bounded() {
        let config = AnalyzerConfig::default();
        let policy = config.poll_policy();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 600);
    }

    #[test]
    fn test_poll_policy_saturates_huge_timeout() {
        let config = AnalyzerConfig {
            poll_timeout_secs: u64::MAX,
            ..AnalyzerConfig::default()
        };
        let policy = config.poll_policy();
        assert_eq!(policy.max_attempts, u32::MAX);

        let config = AnalyzerConfig {
            poll_timeout_secs: u64::MAX,
            poll_interval_ms: 0,
            ..AnalyzerConfig::default()
        };
        assert_eq!(config.poll_policy().max_attempts, u32::MAX);
    }

    #[test]
    fn test_outbound_limits_default() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.search_timeout(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_cached_agents, 32);
    }

    #[test]
    fn test_credential_source_parse() {
        assert_eq!(
            CredentialSource::parse("ENV"),
            Some(CredentialSource::Environment)
        );
        assert_eq!(
            CredentialSource::parse(" interactive "),
            Some(CredentialSource::Interactive)
        );
        assert_eq!(CredentialSource::parse("vault"), None);
    }

    #[test]
    fn test_from_env_cors_fallback() {
        unsafe { env::remove_var("ALLOWED_ORIGINS") };
        let config = AnalyzerConfig::from_env();
        let default_config = AnalyzerConfig::default();
        assert_eq!(config.allowed_origins, default_config.allowed_origins);
    }
}
