//! The orchestration pipeline and its public API.

use std::sync::Arc;

use agent_core::{
    AgentCatalog, AgentInvoker, EmptyCatalog, LlmBackend, NoopRelease, NullBackend, NullInvoker,
    PromptOrigin, PromptTemplate, ReleaseHook,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::budget::{Bounded, Budget};
use crate::config::OrchestratorConfig;
use crate::coordinator::ExecutionCoordinator;
use crate::error::OrchestratorError;
use crate::guard::{MemoryGuard, MemoryProbe, ProcStatusProbe};
use crate::model::StageResults;
use crate::plan::build_plan;
use crate::reasoning::{reasoning_prompt, ReasoningStage};
use crate::scorer::AgentScorer;
use crate::session::{Session, SessionId, SessionStatus, SessionStore};
use crate::synthesizer::{self, ResponseSynthesizer};

/// Result of a finished orchestration run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub final_response: String,
    pub stage_results: StageResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builder for [`Orchestrator`].
///
/// Collaborators that are not set fall back to the null implementations,
/// which make every stage take its heuristic path.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    backend: Arc<dyn LlmBackend>,
    catalog: Arc<dyn AgentCatalog>,
    invoker: Arc<dyn AgentInvoker>,
    release: Arc<dyn ReleaseHook>,
    probe: Arc<dyn MemoryProbe>,
    store: Option<Arc<SessionStore>>,
    reasoning_template: Option<String>,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            backend: Arc::new(NullBackend),
            catalog: Arc::new(EmptyCatalog),
            invoker: Arc::new(NullInvoker),
            release: Arc::new(NoopRelease),
            probe: Arc::new(ProcStatusProbe),
            store: None,
            reasoning_template: None,
        }
    }

    pub fn backend(mut self, backend: impl LlmBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn catalog(mut self, catalog: impl AgentCatalog + 'static) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn invoker(mut self, invoker: impl AgentInvoker + 'static) -> Self {
        self.invoker = Arc::new(invoker);
        self
    }

    pub fn release(mut self, release: impl ReleaseHook + 'static) -> Self {
        self.release = Arc::new(release);
        self
    }

    pub fn memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Arc::new(probe);
        self
    }

    /// Share an existing session store instead of creating one.
    pub fn session_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `template` for the reasoning prompt, ignoring the configured sources.
    pub fn reasoning_template(mut self, template: impl Into<String>) -> Self {
        self.reasoning_template = Some(template.into());
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = self.config;
        let store = self.store.unwrap_or_default();

        let template = match self.reasoning_template {
            Some(text) => PromptTemplate::new(text, PromptOrigin::Inline),
            None => reasoning_prompt(&config),
        };
        let reasoning = ReasoningStage::new(
            self.backend.clone(),
            self.release.clone(),
            &config.model,
            config.llm_timeout,
            config.max_query_chars,
            template,
        );
        let scorer = AgentScorer::new(
            self.backend.clone(),
            self.release.clone(),
            &config.model,
            config.llm_timeout,
        );
        let coordinator = ExecutionCoordinator::new(
            self.invoker,
            self.backend.clone(),
            self.release.clone(),
            &config.model,
            config.agent_timeout,
            config.llm_timeout,
        )
        .with_refinement(config.refine_context, config.max_context_chars);
        let synthesizer = ResponseSynthesizer::new(
            self.backend,
            self.release.clone(),
            &config.model,
            config.llm_timeout,
        );
        let guard = Arc::new(MemoryGuard::new(
            store.clone(),
            self.probe,
            self.release,
            config.guard.clone(),
        ));

        info!(
            model = %config.model,
            max_agents = config.max_agents,
            overall_timeout = ?config.overall_timeout,
            "Orchestrator ready"
        );

        Orchestrator {
            inner: Arc::new(Pipeline {
                config,
                catalog: self.catalog,
                reasoning,
                scorer,
                coordinator,
                synthesizer,
                store,
                guard,
            }),
        }
    }
}

/// Entry point: submit queries, poll sessions, cancel them.
///
/// Cheap to clone; clones share the same sessions and collaborators.
///
/// ```no_run
/// use orchestrator::{Orchestrator, OrchestratorConfig};
///
/// # async fn demo() -> Result<(), orchestrator::OrchestratorError> {
/// let orchestrator = Orchestrator::builder(OrchestratorConfig::from_env()).build();
/// let outcome = orchestrator.run("Summarize this contract").await?;
/// println!("{}", outcome.final_response);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Pipeline>,
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Start processing `query` in the background.
    pub async fn submit(&self, query: &str) -> Result<SessionId, OrchestratorError> {
        let (id, _handle) = self.spawn(query).await;
        Ok(id)
    }

    /// Process `query` and wait for the outcome.
    ///
    /// Returns within the overall timeout. An expired or cancelled session
    /// still yields `Ok` with status `Expired` and a partial response.
    pub async fn run(&self, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let (id, handle) = self.spawn(query).await;
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(session_id = %id, error = %e, "PIPELINE_TASK_FAILED");
                self.inner.store.transition(&id, SessionStatus::Failed).await;
                Err(OrchestratorError::Internal(format!("pipeline task failed: {}", e)))
            }
        }
    }

    /// Current snapshot of a session.
    pub async fn get_status(&self, id: &SessionId) -> Result<Session, OrchestratorError> {
        self.inner
            .store
            .get(id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(id.clone()))
    }

    /// Remove a session, stopping its pipeline. Returns false if unknown.
    pub async fn cancel(&self, id: &SessionId) -> bool {
        let removed = self.inner.store.remove(id).await.is_some();
        if removed {
            info!(session_id = %id, "SESSION_CANCELLED");
        }
        removed
    }

    pub async fn list_active(&self) -> Vec<Session> {
        self.inner.store.list_active().await
    }

    /// Run the memory guard in the background until `shutdown` fires.
    pub fn start_guard(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.inner.guard.clone().spawn(shutdown)
    }

    pub fn guard(&self) -> &Arc<MemoryGuard> {
        &self.inner.guard
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.inner.store
    }

    async fn spawn(&self, query: &str) -> (SessionId, JoinHandle<Result<RunOutcome, OrchestratorError>>) {
        let session = self.inner.store.create(query).await;
        let id = session.id.clone();
        let pipeline = self.inner.clone();
        let handle = tokio::spawn(async move { pipeline.process(session).await });
        (id, handle)
    }
}

struct Pipeline {
    config: OrchestratorConfig,
    catalog: Arc<dyn AgentCatalog>,
    reasoning: ReasoningStage,
    scorer: AgentScorer,
    coordinator: ExecutionCoordinator,
    synthesizer: ResponseSynthesizer,
    store: Arc<SessionStore>,
    guard: Arc<MemoryGuard>,
}

impl Pipeline {
    async fn process(&self, session: Session) -> Result<RunOutcome, OrchestratorError> {
        let id = session.id;
        let query = session.query;
        let started = Instant::now();

        // A session removed before the task started still gets a cancelled token.
        let token = match self.store.cancel_token(&id).await {
            Some(token) => token,
            None => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        };
        let budget = Budget::new(started + self.config.overall_timeout, token);
        info!(session_id = %id, query_chars = query.chars().count(), "SESSION_START");

        let mut results = StageResults::default();

        let agents = match budget.bound(self.config.llm_timeout, self.catalog.list()).await {
            Bounded::Done(Ok(agents)) => agents,
            Bounded::Done(Err(e)) => return Err(self.fail(&id, e.into()).await),
            Bounded::TimedOut => {
                let e = OrchestratorError::BackendUnavailable("agent catalog timed out".into());
                return Err(self.fail(&id, e).await);
            }
            interrupted => {
                debug!(outcome = interrupted.label(), "CATALOG_INTERRUPTED");
                Vec::new()
            }
        };
        info!(session_id = %id, agents = agents.len(), "CATALOG_LOADED");
        results.agents = Some(agents.clone());
        self.publish(&id, &results).await;

        let analysis = self.reasoning.analyze(&query, &budget).await;
        results.analysis = Some(analysis.clone());
        self.publish(&id, &results).await;

        let scores = self.scorer.score(&query, &analysis, &agents, &budget).await;
        results.scores = Some(scores.clone());
        self.publish(&id, &results).await;

        let plan = build_plan(&analysis, &scores, self.config.max_agents);
        info!(
            session_id = %id,
            strategy = %plan.strategy,
            agents = ?plan.agent_ids(),
            rationale = %plan.rationale,
            "PLAN_BUILT"
        );
        if let Err(e) = self.store.set_plan(&id, plan.clone()).await {
            debug!(session_id = %id, error = %e, "Plan not stored");
        }
        results.plan = Some(plan.clone());

        let coordination = self.coordinator.execute(&plan, &query, &budget).await;
        for step in &coordination.steps {
            self.store.append_step(&id, step.clone()).await;
        }
        results.steps = coordination.steps;

        let interrupted = coordination.interrupted || budget.is_exhausted();
        let final_response = if interrupted {
            synthesizer::fallback(&results.steps)
        } else {
            self.synthesizer.synthesize(&query, &results.steps, &budget).await
        };
        results.final_response = Some(final_response.clone());

        let (status, error) = if interrupted {
            let reason = if budget.is_cancelled() {
                format!("session {} was cancelled", id)
            } else {
                OrchestratorError::SessionTimeout(id.clone()).to_string()
            };
            (SessionStatus::Expired, Some(reason))
        } else {
            (SessionStatus::Completed, execution_error(&results))
        };

        if let Some(message) = &error {
            self.store
                .update(&id, |s| s.error = Some(message.clone()))
                .await;
        }
        if !self.store.finalize(&id, final_response.clone(), status).await {
            debug!(session_id = %id, "Session gone before finalize");
        }

        info!(
            session_id = %id,
            status = ?status,
            steps = results.steps.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "SESSION_COMPLETE"
        );

        Ok(RunOutcome {
            session_id: id,
            status,
            final_response,
            stage_results: results,
            error,
        })
    }

    /// Copy the pre-plan stage results into the stored session.
    async fn publish(&self, id: &SessionId, results: &StageResults) {
        let agents = results.agents.clone();
        let analysis = results.analysis.clone();
        let scores = results.scores.clone();
        self.store
            .update(id, move |session| {
                session.stage_results.agents = agents;
                session.stage_results.analysis = analysis;
                session.stage_results.scores = scores;
            })
            .await;
    }

    async fn fail(&self, id: &SessionId, error: OrchestratorError) -> OrchestratorError {
        warn!(session_id = %id, error = %error, "SESSION_FAILED");
        let message = error.to_string();
        self.store.update(id, |s| s.error = Some(message)).await;
        self.store.transition(id, SessionStatus::Failed).await;
        error
    }
}

/// The error to record when every agent step failed.
fn execution_error(results: &StageResults) -> Option<String> {
    let agent_steps: Vec<_> = results.steps.iter().filter(|s| !s.advisory).collect();
    if agent_steps.is_empty() || agent_steps.iter().any(|s| s.success) {
        return None;
    }
    let last = agent_steps[agent_steps.len() - 1];
    let error = OrchestratorError::AgentExecution {
        agent_id: last.agent_id.clone(),
        message: last.error.clone().unwrap_or_else(|| "unknown error".to_string()),
    };
    Some(error.to_string())
}
