//! HTTP agent catalog client.

use agent_core::{async_trait, AgentCatalog, AgentDescriptor, CatalogError};
use reqwest::Client;
use tracing::debug;

use crate::api_types::CatalogPayload;
use crate::config::HttpAgentsConfig;

/// Lists agents with `GET {catalog_url}/agents`.
pub struct HttpAgentCatalog {
    client: Client,
    url: String,
}

impl HttpAgentCatalog {
    /// Create a catalog client with the given configuration.
    pub fn new(config: &HttpAgentsConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CatalogError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/agents", config.catalog_url),
        })
    }
}

/// Decode a catalog body in either supported shape.
pub(crate) fn parse_catalog(body: &str) -> Result<Vec<AgentDescriptor>, CatalogError> {
    serde_json::from_str::<CatalogPayload>(body)
        .map(CatalogPayload::into_agents)
        .map_err(|e| CatalogError::InvalidResponse(format!("Failed to parse catalog: {}", e)))
}

#[async_trait]
impl AgentCatalog for HttpAgentCatalog {
    async fn list(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("Failed to reach catalog: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Unavailable(format!(
                "catalog returned status {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CatalogError::Unavailable(format!("Failed to read catalog: {}", e)))?;

        let agents = parse_catalog(&body)?;
        debug!(count = agents.len(), "Fetched agent catalog");
        Ok(agents)
    }
}
