//! Null collaborators.
//!
//! Chosen explicitly at construction time when a collaborator is not
//! configured. The orchestrator still runs: a [`NullBackend`] pushes every
//! stage onto its heuristic fallback.

use std::time::Duration;

use async_trait::async_trait;

use crate::agent::AgentDescriptor;
use crate::catalog::AgentCatalog;
use crate::error::{BackendError, CatalogError};
use crate::invoker::{AgentInvoker, Invocation};
use crate::llm::{GenerateRequest, Generation, LlmBackend};

/// A backend that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

#[async_trait]
impl LlmBackend for NullBackend {
    async fn generate(&self, _request: GenerateRequest) -> Result<Generation, BackendError> {
        Err(BackendError::Unavailable("no LLM backend configured".to_string()))
    }

    fn name(&self) -> &str {
        "NullBackend"
    }

    async fn is_ready(&self) -> bool {
        false
    }
}

/// A catalog with no agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

#[async_trait]
impl AgentCatalog for EmptyCatalog {
    async fn list(&self) -> Result<Vec<AgentDescriptor>, CatalogError> {
        Ok(Vec::new())
    }
}

/// An invoker that fails every invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInvoker;

#[async_trait]
impl AgentInvoker for NullInvoker {
    async fn invoke(&self, agent_id: &str, _input: &str, _timeout: Duration) -> Invocation {
        Invocation::failure(format!("no invoker configured for agent {}", agent_id))
    }
}
