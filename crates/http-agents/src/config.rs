//! Configuration for the HTTP transports.

use agent_core::BackendError;
use std::env;
use std::time::Duration;

/// Default chat-completions endpoint (a local Ollama server).
pub const DEFAULT_LLM_URL: &str = "http://localhost:11434";

/// Default agent service endpoint.
pub const DEFAULT_AGENT_SERVICE_URL: &str = "http://localhost:8080";

/// Configuration shared by the HTTP transports.
#[derive(Debug, Clone)]
pub struct HttpAgentsConfig {
    /// Base URL of the OpenAI-compatible chat-completions API.
    pub llm_url: String,

    /// Optional bearer token for the chat-completions API.
    pub llm_api_key: Option<String>,

    /// Base URL of the agent catalog service.
    pub catalog_url: String,

    /// Base URL of the agent invocation service.
    pub invoker_url: String,

    /// Base URL of the model server that accepts unload requests.
    pub unload_url: String,

    /// Timeout for catalog and unload requests.
    pub request_timeout: Duration,
}

impl Default for HttpAgentsConfig {
    fn default() -> Self {
        Self {
            llm_url: DEFAULT_LLM_URL.to_string(),
            llm_api_key: None,
            catalog_url: DEFAULT_AGENT_SERVICE_URL.to_string(),
            invoker_url: DEFAULT_AGENT_SERVICE_URL.to_string(),
            unload_url: DEFAULT_LLM_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpAgentsConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `ENSEMBLE_LLM_URL` - Chat-completions base URL (default: http://localhost:11434)
    /// - `ENSEMBLE_LLM_API_KEY` - Bearer token for the chat-completions API
    /// - `ENSEMBLE_CATALOG_URL` - Agent catalog base URL (default: http://localhost:8080)
    /// - `ENSEMBLE_INVOKER_URL` - Agent invocation base URL (default: catalog URL)
    /// - `ENSEMBLE_UNLOAD_URL` - Model unload base URL (default: LLM URL)
    /// - `ENSEMBLE_HTTP_TIMEOUT_SECS` - Catalog/unload request timeout (default: 10)
    pub fn from_env() -> Result<Self, BackendError> {
        let llm_url = env::var("ENSEMBLE_LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string());

        let llm_api_key = env::var("ENSEMBLE_LLM_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let catalog_url = env::var("ENSEMBLE_CATALOG_URL")
            .unwrap_or_else(|_| DEFAULT_AGENT_SERVICE_URL.to_string());

        let invoker_url = env::var("ENSEMBLE_INVOKER_URL").unwrap_or_else(|_| catalog_url.clone());

        let unload_url = env::var("ENSEMBLE_UNLOAD_URL").unwrap_or_else(|_| llm_url.clone());

        let request_timeout = env::var("ENSEMBLE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            llm_url: normalize_url("ENSEMBLE_LLM_URL", &llm_url)?,
            llm_api_key,
            catalog_url: normalize_url("ENSEMBLE_CATALOG_URL", &catalog_url)?,
            invoker_url: normalize_url("ENSEMBLE_INVOKER_URL", &invoker_url)?,
            unload_url: normalize_url("ENSEMBLE_UNLOAD_URL", &unload_url)?,
            request_timeout,
        })
    }

    /// Create a new config builder.
    pub fn builder() -> HttpAgentsConfigBuilder {
        HttpAgentsConfigBuilder::default()
    }
}

/// Builder for HttpAgentsConfig.
#[derive(Debug, Default)]
pub struct HttpAgentsConfigBuilder {
    config: HttpAgentsConfig,
}

impl HttpAgentsConfigBuilder {
    /// Set the chat-completions URL.
    pub fn llm_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_url = url.into();
        self
    }

    /// Set the chat-completions API key.
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = Some(key.into());
        self
    }

    /// Set the catalog URL.
    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.config.catalog_url = url.into();
        self
    }

    /// Set the invocation URL.
    pub fn invoker_url(mut self, url: impl Into<String>) -> Self {
        self.config.invoker_url = url.into();
        self
    }

    /// Set the unload URL.
    pub fn unload_url(mut self, url: impl Into<String>) -> Self {
        self.config.unload_url = url.into();
        self
    }

    /// Set the catalog/unload request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the configuration, validating every URL.
    pub fn build(self) -> Result<HttpAgentsConfig, BackendError> {
        let config = self.config;
        Ok(HttpAgentsConfig {
            llm_url: normalize_url("llm_url", &config.llm_url)?,
            catalog_url: normalize_url("catalog_url", &config.catalog_url)?,
            invoker_url: normalize_url("invoker_url", &config.invoker_url)?,
            unload_url: normalize_url("unload_url", &config.unload_url)?,
            ..config
        })
    }
}

/// Trim whitespace and trailing slashes, and require an http(s) scheme.
fn normalize_url(field: &str, url: &str) -> Result<String, BackendError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(BackendError::Configuration(format!(
            "{} must be an http(s) URL, got '{}'",
            field, url
        )));
    }
    Ok(trimmed.to_string())
}
