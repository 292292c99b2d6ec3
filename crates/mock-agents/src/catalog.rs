//! Fixed agent catalogs.

use agent_core::{async_trait, AgentCatalog, AgentDescriptor, CatalogError};

/// A catalog that always lists the same agents.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    agents: Vec<AgentDescriptor>,
}

impl StaticCatalog {
    /// Create a catalog listing `agents` in the given order.
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl AgentCatalog for StaticCatalog {
    async fn list(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        Ok(self.agents.clone())
    }
}

/// A catalog that can never be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCatalog;

#[async_trait]
impl AgentCatalog for UnavailableCatalog {
    async fn list(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        Err(CatalogError::Unavailable("catalog offline".to_string()))
    }
}
