use std::env;
use std::fmt;
use std::sync::Arc;

use crate::config::{AnalyzerConfig, CredentialSource};
use crate::services::error::{AnalyzerError, Result};

/// An API key for the remote AI service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Supplies the credential used for one analysis request.
pub trait CredentialProvider: Send + Sync {
    fn source(&self) -> CredentialSource;

    /// `supplied` is the key the user sent with the request, if any.
    fn resolve(&self, supplied: Option<&str>) -> Result<Credential>;
}

/// Reads the key from a process environment variable.
pub struct EnvironmentCredentials {
    var: String,
}

impl EnvironmentCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn is_configured(&self) -> bool {
        env::var(&self.var)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    }
}

impl CredentialProvider for EnvironmentCredentials {
    fn source(&self) -> CredentialSource {
        CredentialSource::Environment
    }

    fn resolve(&self, _supplied: Option<&str>) -> Result<Credential> {
        match env::var(&self.var) {
            Ok(key) if !key.trim().is_empty() => Ok(Credential::new(key.trim())),
            _ => Err(AnalyzerError::Configuration {
                message: format!("No valid {} found. Please add it to your .env.", self.var),
                interactive: false,
            }),
        }
    }
}

/// Takes the key from the request itself.
pub struct InteractiveCredentials;

impl CredentialProvider for InteractiveCredentials {
    fn source(&self) -> CredentialSource {
        CredentialSource::Interactive
    }

    fn resolve(&self, supplied: Option<&str>) -> Result<Credential> {
        match supplied.map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Credential::new(key)),
            _ => Err(AnalyzerError::Configuration {
                message: "Please enter your Google API key to continue.".to_string(),
                interactive: true,
            }),
        }
    }
}

pub fn provider_from_config(config: &AnalyzerConfig) -> Arc<dyn CredentialProvider> {
    match config.credential_source {
        CredentialSource::Environment => Arc::new(EnvironmentCredentials::new(&config.api_key_env)),
        CredentialSource::Interactive => Arc::new(InteractiveCredentials),
    }
}
