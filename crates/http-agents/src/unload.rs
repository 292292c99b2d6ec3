//! Model unload hook for Ollama-style servers.

use agent_core::{async_trait, BackendError, ReleaseHook, ReleaseReason};
use reqwest::Client;
use tracing::{debug, warn};

use crate::api_types::UnloadRequest;
use crate::config::HttpAgentsConfig;

/// Asks the model server to unload `model` after each stage.
///
/// Sends `POST {unload_url}/api/generate` with `keep_alive: 0`, which makes
/// Ollama evict the model from memory. Failures are logged and swallowed.
pub struct OllamaUnloadHook {
    client: Client,
    url: String,
    model: String,
}

impl OllamaUnloadHook {
    /// Create a hook that unloads `model`.
    pub fn new(config: &HttpAgentsConfig, model: impl Into<String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/generate", config.unload_url),
            model: model.into(),
        })
    }
}

#[async_trait]
impl ReleaseHook for OllamaUnloadHook {
    async fn release(&self, reason: ReleaseReason) {
        let body = UnloadRequest {
            model: &self.model,
            keep_alive: 0,
        };

        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(model = %self.model, ?reason, "Model unloaded");
            }
            Ok(response) => {
                warn!(
                    model = %self.model,
                    status = response.status().as_u16(),
                    "MODEL_UNLOAD_REJECTED"
                );
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "MODEL_UNLOAD_FAILED");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::PipelineStage;

    #[tokio::test]
    async fn test_release_never_panics_when_server_down() {
        let config = HttpAgentsConfig::builder()
            .unload_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let hook = OllamaUnloadHook::new(&config, "qwen3:8b").unwrap();

        hook.release(ReleaseReason::StageComplete(PipelineStage::Scoring))
            .await;
        hook.release(ReleaseReason::MemoryPressure).await;
    }
}
