//! Multi-agent orchestration engine.
//!
//! This crate provides the [`Orchestrator`] type, which turns a user query into
//! a plan over a catalog of specialized agents, runs the plan, and composes one
//! final answer, all inside a session with a deadline.
//!
//! # Architecture
//!
//! ```text
//! query
//!   ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │                                                             │
//! │  1. SessionStore::create                                    │
//! │         ↓                                                   │
//! │  2. AgentCatalog::list                                      │
//! │         ↓                                                   │
//! │  3. ReasoningStage   intent, domain, complexity, pattern    │
//! │         ↓                                                   │
//! │  4. AgentScorer      one relevance score per agent          │
//! │         ↓                                                   │
//! │  5. build_plan       single / sequential / parallel /       │
//! │                      orchestrator only                      │
//! │         ↓                                                   │
//! │  6. ExecutionCoordinator  invoke agents, hand off context   │
//! │         ↓                                                   │
//! │  7. ResponseSynthesizer   merge outputs into one answer     │
//! │         ↓                                                   │
//! │  8. SessionStore::finalize                                  │
//! └─────────────────────────────────────────────────────────────┘
//!
//! MemoryGuard (background): TTL expiry + memory-pressure eviction
//! ```
//!
//! Every LLM-backed stage degrades to a keyword heuristic when the backend is
//! unavailable, slow, or returns something unparsable. Every model and agent
//! call is raced against the session [`Budget`].
//!
//! # Example
//!
//! ```rust,no_run
//! use mock_agents::{AgentDescriptor, EchoInvoker, StaticCatalog};
//! use orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = StaticCatalog::new(vec![AgentDescriptor::new("legal", "Legal Advisor")
//!         .with_description("Reviews and summarizes contracts")]);
//!
//!     let orchestrator = Orchestrator::builder(OrchestratorConfig::from_env())
//!         .catalog(catalog)
//!         .invoker(EchoInvoker::new())
//!         .build();
//!
//!     let outcome = orchestrator.run("Summarize this contract").await?;
//!     println!("{:?}: {}", outcome.status, outcome.final_response);
//!     Ok(())
//! }
//! ```

mod budget;
mod config;
mod coordinator;
mod error;
mod guard;
mod handoff;
mod json;
mod model;
mod orchestrator;
mod plan;
mod reasoning;
mod scorer;
mod session;
mod synthesizer;

// Public exports
pub use budget::{Bounded, Budget};
pub use config::{GuardConfig, OrchestratorConfig, DEFAULT_MODEL, DEFAULT_REASONING_PROMPT_FILE};
pub use coordinator::{Coordination, ExecutionCoordinator};
pub use error::{OrchestratorError, ParseError};
pub use guard::{parse_vm_rss, MemoryGuard, MemoryProbe, ProcStatusProbe, SweepReport};
pub use handoff::HandoffContext;
pub use json::{extract_json, parse_tolerant, repair};
pub use model::{
    clamp_score, AgentScore, Complexity, ExecutionPlan, ExecutionStep, PlannedTask, QueryAnalysis,
    Source, StageResults, Strategy, ADVISORY_MESSAGE, APOLOGY_MESSAGE,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, RunOutcome};
pub use plan::{build_plan, PARALLEL_GAP, RELEVANCE_THRESHOLD, SEQUENTIAL_THRESHOLD};
pub use reasoning::{
    heuristic_analysis, parse_analysis, reasoning_prompt, ReasoningStage, DEFAULT_REASONING_PROMPT,
};
pub use scorer::{
    build_scoring_prompt, heuristic_scores, merge_evaluations, parse_evaluations, AgentScorer,
    Evaluation,
};
pub use session::{Session, SessionId, SessionStatus, SessionStore};
pub use synthesizer::{fallback as fallback_response, ResponseSynthesizer};

// Re-export the collaborator traits so callers need only this crate
pub use agent_core::{
    AgentCatalog, AgentDescriptor, AgentInvoker, Invocation, LlmBackend, PipelineStage,
    PromptOrigin, PromptTemplate, ReleaseHook, ReleaseReason,
};
