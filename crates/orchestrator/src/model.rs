//! Records passed between pipeline stages.

use std::fmt;
use std::time::Duration;

use agent_core::{AgentDescriptor, Invocation};
use serde::{Deserialize, Serialize};

/// Text returned when no agent is a good match for the query.
pub const ADVISORY_MESSAGE: &str = "None of the available agents is a strong match for this request, \
so it was not delegated. Try rephrasing it with more detail, or ask about a topic one of the agents covers.";

/// Text returned when every agent invocation failed.
pub const APOLOGY_MESSAGE: &str =
    "I'm sorry, but none of the agents could complete this request. Please try again in a moment.";

/// Whether a record came from the model or from a keyword heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Model,
    Heuristic,
}

/// How demanding a query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl Complexity {
    /// Map a free-form label to a complexity.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        if label.starts_with("simple") || label.starts_with("low") || label.starts_with("easy") {
            Some(Self::Simple)
        } else if label.starts_with("moderate") || label.starts_with("medium") {
            Some(Self::Moderate)
        } else if label.starts_with("complex") || label.starts_with("high") || label.starts_with("hard") {
            Some(Self::Complex)
        } else {
            None
        }
    }
}

/// Execution strategy, used both as the analysis hint and as the plan choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Single,
    Sequential,
    Parallel,
    OrchestratorOnly,
}

impl Strategy {
    /// Map a free-form label to a strategy, accepting common synonyms.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.starts_with("orchestrator only")
            || normalized.starts_with("orchestratoronly")
            || normalized.starts_with("orchestrator")
            || normalized == "none"
            || normalized.starts_with("no agent")
            || normalized.starts_with("advisory")
        {
            Some(Self::OrchestratorOnly)
        } else if normalized.starts_with("single") || normalized.starts_with("one agent") {
            Some(Self::Single)
        } else if normalized.starts_with("sequential")
            || normalized.starts_with("chain")
            || normalized.starts_with("pipeline")
        {
            Some(Self::Sequential)
        } else if normalized.starts_with("parallel") || normalized.starts_with("concurrent") {
            Some(Self::Parallel)
        } else {
            None
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::OrchestratorOnly => "orchestrator_only",
        };
        f.write_str(name)
    }
}

/// Classification of a user query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub user_intent: String,
    pub domain: String,
    pub complexity: Complexity,
    pub pattern: Strategy,
    pub source: Source,
}

/// Relevance of one catalog agent to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent_id: String,
    pub agent_name: String,
    /// Always within `[0, 1]`.
    pub association_score: f64,
    pub role_analysis: String,
    pub relevance_justification: String,
    pub source: Source,
}

impl AgentScore {
    /// Build a score for `agent`, clamping `score` into `[0, 1]` (NaN becomes 0).
    pub fn new(
        agent: &AgentDescriptor,
        score: f64,
        role_analysis: impl Into<String>,
        relevance_justification: impl Into<String>,
        source: Source,
    ) -> Self {
        Self {
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            association_score: clamp_score(score),
            role_analysis: role_analysis.into(),
            relevance_justification: relevance_justification.into(),
            source,
        }
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// One agent's slot in a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub agent_id: String,
    pub agent_name: String,
    /// 1..n for single and sequential plans, 0 for every parallel task.
    pub order: u32,
    pub task_assignment: String,
    pub score: f64,
}

/// Strategy plus the ordered tasks that realize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub strategy: Strategy,
    pub ordered_tasks: Vec<PlannedTask>,
    pub rationale: String,
}

impl ExecutionPlan {
    pub fn agent_ids(&self) -> Vec<&str> {
        self.ordered_tasks.iter().map(|t| t.agent_id.as_str()).collect()
    }
}

/// Result of one agent invocation, or of the advisory pseudo-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub agent_id: String,
    pub agent_name: String,
    pub order: u32,
    pub output_text: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    /// True only for the synthetic step of an orchestrator-only plan.
    #[serde(default)]
    pub advisory: bool,
}

impl ExecutionStep {
    /// Record the result of invoking `task`.
    pub fn from_invocation(task: &PlannedTask, invocation: Invocation, elapsed: Duration) -> Self {
        Self {
            agent_id: task.agent_id.clone(),
            agent_name: task.agent_name.clone(),
            order: task.order,
            output_text: invocation.output_text,
            success: invocation.success,
            error: invocation.error,
            duration_ms: elapsed.as_millis() as u64,
            advisory: false,
        }
    }

    /// Record a failed invocation of `task`.
    pub fn failed(task: &PlannedTask, error: impl Into<String>, elapsed: Duration) -> Self {
        Self::from_invocation(task, Invocation::failure(error), elapsed)
    }

    /// The synthetic step emitted when no agent is invoked.
    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            agent_id: "orchestrator".to_string(),
            agent_name: "Orchestrator".to_string(),
            order: 0,
            output_text: message.into(),
            success: true,
            error: None,
            duration_ms: 0,
            advisory: true,
        }
    }
}

/// Everything the pipeline produced for a session so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<QueryAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<AgentScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlan>,
    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
}
