//! HTTP transports for the Ensemble orchestrator.
//!
//! This crate provides concrete implementations of the `agent-core`
//! collaborator traits over HTTP:
//!
//! - [`ChatCompletionsBackend`] - OpenAI-compatible `/v1/chat/completions`
//! - [`HttpAgentCatalog`] - `GET /agents`
//! - [`HttpAgentInvoker`] - `POST /agents/{id}/invoke`
//! - [`OllamaUnloadHook`] - `POST /api/generate` with `keep_alive: 0`
//!
//! Everything is configured through [`HttpAgentsConfig`], usually from
//! `ENSEMBLE_*` environment variables.
//!
//! # Usage
//!
//! ```rust,no_run
//! use http_agents::{ChatCompletionsBackend, HttpAgentCatalog, HttpAgentsConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpAgentsConfig::from_env()?;
//!     let backend = ChatCompletionsBackend::new(&config)?;
//!     let catalog = HttpAgentCatalog::new(&config)?;
//!     // Hand them to the orchestrator...
//!     Ok(())
//! }
//! ```

mod api_types;
mod backend;
mod catalog;
mod config;
mod invoker;
mod unload;

pub use backend::ChatCompletionsBackend;
pub use catalog::HttpAgentCatalog;
pub use config::{HttpAgentsConfig, HttpAgentsConfigBuilder};
pub use invoker::HttpAgentInvoker;
pub use unload::OllamaUnloadHook;

// Re-export agent-core types for convenience
pub use agent_core::{
    async_trait, AgentCatalog, AgentDescriptor, AgentInvoker, BackendError, CatalogError,
    LlmBackend, ReleaseHook,
};
