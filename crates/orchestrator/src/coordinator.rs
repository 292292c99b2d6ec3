//! Plan execution: single, sequential with hand-off, parallel, or advisory.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    strip_reasoning, AgentInvoker, GenerateOptions, GenerateRequest, Invocation, LlmBackend,
    PipelineStage, ReleaseHook, ReleaseReason,
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::budget::{Bounded, Budget};
use crate::handoff::HandoffContext;
use crate::model::{ExecutionPlan, ExecutionStep, PlannedTask, Strategy, ADVISORY_MESSAGE};

/// Steps produced by running a plan.
#[derive(Debug, Clone, Default)]
pub struct Coordination {
    /// Recorded in execution order (plan order for parallel plans).
    pub steps: Vec<ExecutionStep>,
    /// True when the session deadline or cancellation cut execution short.
    pub interrupted: bool,
}

/// Runs an [`ExecutionPlan`] against the agent invoker.
///
/// Every invocation is a single attempt bounded by the agent timeout and the
/// session budget. Failures become failed steps; nothing here returns an error.
pub struct ExecutionCoordinator {
    invoker: Arc<dyn AgentInvoker>,
    backend: Arc<dyn LlmBackend>,
    release: Arc<dyn ReleaseHook>,
    model: String,
    agent_timeout: Duration,
    llm_timeout: Duration,
    refine_context: bool,
    max_context_chars: usize,
}

impl ExecutionCoordinator {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        backend: Arc<dyn LlmBackend>,
        release: Arc<dyn ReleaseHook>,
        model: impl Into<String>,
        agent_timeout: Duration,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            invoker,
            backend,
            release,
            model: model.into(),
            agent_timeout,
            llm_timeout,
            refine_context: true,
            max_context_chars: 4000,
        }
    }

    /// Configure context refinement between sequential hand-offs.
    pub fn with_refinement(mut self, enabled: bool, max_context_chars: usize) -> Self {
        self.refine_context = enabled;
        self.max_context_chars = max_context_chars;
        self
    }

    pub async fn execute(&self, plan: &ExecutionPlan, query: &str, budget: &Budget) -> Coordination {
        info!(
            strategy = %plan.strategy,
            agents = ?plan.agent_ids(),
            "EXECUTION_START"
        );

        let coordination = match plan.strategy {
            Strategy::OrchestratorOnly => Coordination {
                steps: vec![ExecutionStep::advisory(ADVISORY_MESSAGE)],
                interrupted: false,
            },
            Strategy::Single => self.run_single(plan, query, budget).await,
            Strategy::Sequential => self.run_sequential(plan, query, budget).await,
            Strategy::Parallel => self.run_parallel(plan, query, budget).await,
        };

        let succeeded = coordination.steps.iter().filter(|s| s.success).count();
        info!(
            steps = coordination.steps.len(),
            succeeded,
            interrupted = coordination.interrupted,
            "EXECUTION_COMPLETE"
        );
        coordination
    }

    async fn run_single(&self, plan: &ExecutionPlan, query: &str, budget: &Budget) -> Coordination {
        let Some(task) = plan.ordered_tasks.first() else {
            warn!("Single plan without a task");
            return Coordination::default();
        };

        let input = HandoffContext::new(query, self.max_context_chars).render(&task.task_assignment);
        let (step, interrupted) = self.invoke_task(task, &input, budget).await;
        Coordination {
            steps: vec![step],
            interrupted,
        }
    }

    async fn run_sequential(&self, plan: &ExecutionPlan, query: &str, budget: &Budget) -> Coordination {
        let mut handoff = HandoffContext::new(query, self.max_context_chars);
        let mut steps = Vec::with_capacity(plan.ordered_tasks.len());
        let last = plan.ordered_tasks.len().saturating_sub(1);

        for (i, task) in plan.ordered_tasks.iter().enumerate() {
            if budget.is_exhausted() {
                warn!(remaining = plan.ordered_tasks.len() - i, "SEQUENTIAL_STOPPED");
                return Coordination {
                    steps,
                    interrupted: true,
                };
            }

            debug!(agent_id = %task.agent_id, context = %handoff.format_summary(), "HANDOFF");
            let input = handoff.render(&task.task_assignment);
            let (step, interrupted) = self.invoke_task(task, &input, budget).await;

            if step.success {
                handoff.record(&task.agent_name, &step.output_text);
            } else {
                warn!(
                    agent_id = %task.agent_id,
                    error = step.error.as_deref().unwrap_or("unknown"),
                    "SEQUENTIAL_STEP_FAILED"
                );
                handoff.reset();
            }
            steps.push(step);

            if interrupted {
                return Coordination {
                    steps,
                    interrupted: true,
                };
            }

            if i < last && self.refine_context && handoff.has_prior() {
                self.refine(&mut handoff, budget).await;
            }
        }

        Coordination {
            steps,
            interrupted: false,
        }
    }

    async fn run_parallel(&self, plan: &ExecutionPlan, query: &str, budget: &Budget) -> Coordination {
        let mut pending: FuturesUnordered<_> = plan
            .ordered_tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| {
                let input =
                    HandoffContext::new(query, self.max_context_chars).render(&task.task_assignment);
                async move {
                    let (step, interrupted) = self.invoke_task(task, &input, budget).await;
                    (idx, step, interrupted)
                }
            })
            .collect();

        let mut slots: Vec<Option<ExecutionStep>> = vec![None; plan.ordered_tasks.len()];
        let mut interrupted = false;
        while let Some((idx, step, cut)) = pending.next().await {
            debug!(agent_id = %step.agent_id, success = step.success, "PARALLEL_STEP_DONE");
            slots[idx] = Some(step);
            interrupted |= cut;
        }

        Coordination {
            steps: slots.into_iter().flatten().collect(),
            interrupted,
        }
    }

    /// Invoke one agent. The flag is true when the session budget, not the
    /// agent timeout, ended the call.
    async fn invoke_task(&self, task: &PlannedTask, input: &str, budget: &Budget) -> (ExecutionStep, bool) {
        debug!(agent_id = %task.agent_id, order = task.order, input_chars = input.len(), "AGENT_INVOKED");

        let started = Instant::now();
        let outcome = budget
            .bound(
                self.agent_timeout,
                self.invoker.invoke(&task.agent_id, input, self.agent_timeout),
            )
            .await;
        let elapsed = started.elapsed();

        let interrupted = outcome.is_interrupted();
        let step = match outcome {
            Bounded::Done(invocation) => ExecutionStep::from_invocation(task, invocation, elapsed),
            Bounded::TimedOut => {
                ExecutionStep::from_invocation(task, Invocation::timed_out(self.agent_timeout), elapsed)
            }
            Bounded::DeadlineExceeded => {
                ExecutionStep::failed(task, "session deadline exceeded", elapsed)
            }
            Bounded::Cancelled => ExecutionStep::failed(task, "session cancelled", elapsed),
        };

        info!(
            agent_id = %step.agent_id,
            success = step.success,
            duration_ms = step.duration_ms,
            "AGENT_STEP_COMPLETE"
        );
        (step, interrupted)
    }

    /// Condense the hand-off context with one short LLM call.
    ///
    /// On any failure the context is left as is and the cap applies.
    async fn refine(&self, handoff: &mut HandoffContext, budget: &Budget) {
        let Some(prompt) = handoff.refinement_prompt() else {
            return;
        };
        let max_tokens = (self.max_context_chars / 3).clamp(64, 1024) as u32;
        let request = GenerateRequest::new(&self.model, prompt)
            .with_options(GenerateOptions::new(0.2, max_tokens));

        let outcome = budget.bound(self.llm_timeout, self.backend.generate(request)).await;
        let reason = ReleaseReason::StageComplete(PipelineStage::Refinement);
        budget.release(self.release.as_ref(), reason, self.llm_timeout).await;

        match outcome {
            Bounded::Done(Ok(generation)) => {
                let brief = strip_reasoning(&generation.text);
                if brief.trim().is_empty() {
                    warn!("REFINEMENT_EMPTY");
                } else {
                    debug!(chars = brief.chars().count(), "REFINEMENT_APPLIED");
                    handoff.replace_with_refined(brief.trim());
                }
            }
            Bounded::Done(Err(e)) => warn!(error = %e, "REFINEMENT_FAILED"),
            other => warn!(outcome = other.label(), "REFINEMENT_TIMEOUT"),
        }
    }
}
