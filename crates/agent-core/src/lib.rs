//! Collaborator traits and shared types for the Ensemble orchestration engine.
//!
//! The orchestrator never talks to a transport directly. Everything it
//! consumes from the outside world goes through the traits defined here:
//!
//! - [`LlmBackend`] - prompt-in/text-out inference service
//! - [`AgentCatalog`] - the list of invocable agents
//! - [`AgentInvoker`] - runs one agent with a text task
//! - [`ReleaseHook`] - frees inference resources between pipeline stages
//!
//! Null implementations ([`NullBackend`], [`EmptyCatalog`], [`NullInvoker`],
//! [`NoopRelease`]) are provided so optional collaborators can be chosen
//! explicitly at construction time.
//!
//! # Example
//!
//! ```rust
//! use agent_core::{async_trait, BackendError, GenerateRequest, Generation, LlmBackend};
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl LlmBackend for Canned {
//!     async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
//!         Ok(Generation::new(format!("echo: {}", request.prompt)))
//!     }
//!
//!     fn name(&self) -> &str {
//!         "Canned"
//!     }
//! }
//! ```

mod agent;
mod catalog;
mod error;
mod invoker;
mod llm;
mod null;
mod prompt;
mod release;

pub use agent::AgentDescriptor;
pub use catalog::AgentCatalog;
pub use error::{BackendError, CatalogError};
pub use invoker::{AgentInvoker, Invocation};
pub use llm::{GenerateOptions, GenerateRequest, Generation, LlmBackend};
pub use null::{EmptyCatalog, NullBackend, NullInvoker};
pub use prompt::{hash_prompt, strip_reasoning, truncate_chars, PromptOrigin, PromptTemplate};
pub use release::{NoopRelease, PipelineStage, ReleaseHook, ReleaseReason};

// Re-export async_trait for convenience
pub use async_trait::async_trait;
