//! HTTP agent invoker.

use std::time::Duration;

use agent_core::{async_trait, AgentInvoker, BackendError, Invocation};
use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::api_types::{InvokeRequest, InvokeResponse};
use crate::config::HttpAgentsConfig;

/// Invokes agents with `POST {invoker_url}/agents/{id}/invoke`.
///
/// The per-call timeout is applied to the HTTP request itself, so a call
/// always returns within it.
pub struct HttpAgentInvoker {
    client: Client,
    base: Url,
}

impl HttpAgentInvoker {
    /// Create an invoker with the given configuration.
    pub fn new(config: &HttpAgentsConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let base = Url::parse(&config.invoker_url).map_err(|e| {
            BackendError::Configuration(format!("invalid invoker URL '{}': {}", config.invoker_url, e))
        })?;

        Ok(Self { client, base })
    }

    /// URL for invoking `agent_id`, with the id percent-encoded.
    pub fn invoke_url(&self, agent_id: &str) -> Option<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(["agents", agent_id, "invoke"]);
        Some(url)
    }
}

/// Map a decoded response body to an invocation result.
pub(crate) fn into_invocation(response: InvokeResponse) -> Invocation {
    match (response.success, response.output, response.error) {
        (Some(false), _, error) => {
            Invocation::failure(error.unwrap_or_else(|| "agent reported failure".to_string()))
        }
        (_, Some(output), _) => Invocation::success(output),
        (_, None, Some(error)) => Invocation::failure(error),
        (_, None, None) => Invocation::failure("agent returned no output"),
    }
}

#[async_trait]
impl AgentInvoker for HttpAgentInvoker {
    async fn invoke(&self, agent_id: &str, input: &str, timeout: Duration) -> Invocation {
        let Some(url) = self.invoke_url(agent_id) else {
            return Invocation::failure(format!("cannot build invoke URL for agent {}", agent_id));
        };

        debug!(agent_id, "Invoking agent");

        let sent = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&InvokeRequest { input })
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Invocation::timed_out(timeout),
            Err(e) => {
                warn!(agent_id, error = %e, "AGENT_INVOKE_FAILED");
                return Invocation::failure(format!("Failed to reach agent service: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Invocation::failure(format!(
                "agent service error ({}): {}",
                status.as_u16(),
                body
            ));
        }

        match response.json::<InvokeResponse>().await {
            Ok(body) => into_invocation(body),
            Err(e) if e.is_timeout() => Invocation::timed_out(timeout),
            Err(e) => Invocation::failure(format!("Failed to parse agent response: {}", e)),
        }
    }
}
