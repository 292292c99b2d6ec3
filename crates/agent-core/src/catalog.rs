//! The agent catalog trait.

use async_trait::async_trait;

use crate::agent::AgentDescriptor;
use crate::error::CatalogError;

/// Source of the agents an orchestration run may invoke.
///
/// The orchestrator calls [`list`](AgentCatalog::list) once per session and
/// treats the result as an immutable snapshot.
#[async_trait]
pub trait AgentCatalog: Send + Sync {
    /// Fetch the current list of invocable agents.
    async fn list(&self) -> Result<Vec<AgentDescriptor>, CatalogError>;
}
