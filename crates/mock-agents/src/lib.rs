//! Scripted collaborator doubles for the Ensemble orchestrator.
//!
//! This crate provides test implementations of the `agent-core` traits:
//! - `ScriptedBackend` - answers prompts by substring rules, records requests
//! - `StaticCatalog` / `UnavailableCatalog` - fixed agent lists
//! - `ScriptedInvoker` - per-agent replies, failures and delays, records calls
//! - `EchoInvoker` - echoes the task back with the agent id
//! - `DelayedInvoker` / `DelayedBackend` / `DelayedRelease` - wrap another double with latency
//! - `CountingRelease` - records every release request
//!
//! For real transports, use the `http-agents` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_agents::{GenerateRequest, LlmBackend, ScriptedBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = ScriptedBackend::new().when("weather", "It is sunny.");
//!
//!     let generation = backend
//!         .generate(GenerateRequest::new("m", "what's the weather?"))
//!         .await
//!         .unwrap();
//!     assert_eq!(generation.text, "It is sunny.");
//! }
//! ```

mod catalog;
mod delayed;
mod echo;
mod invoker;
mod release;
mod scripted;

// Re-export agent-core types for convenience
pub use agent_core::{
    async_trait, AgentCatalog, AgentDescriptor, AgentInvoker, BackendError, CatalogError,
    GenerateRequest, Generation, Invocation, LlmBackend, PipelineStage, ReleaseHook, ReleaseReason,
};

pub use catalog::{StaticCatalog, UnavailableCatalog};
pub use delayed::{DelayedBackend, DelayedInvoker, DelayedRelease};
pub use echo::EchoInvoker;
pub use invoker::{InvocationRecord, ScriptedInvoker};
pub use release::CountingRelease;
pub use scripted::ScriptedBackend;
