//! Execution plan construction.
//!
//! [`build_plan`] is pure and deterministic: the same analysis, scores and
//! `max_agents` always produce the same plan.

use std::cmp::Ordering;

use crate::model::{AgentScore, ExecutionPlan, PlannedTask, QueryAnalysis, Strategy};

/// Score above which an agent counts as relevant.
pub const RELEVANCE_THRESHOLD: f64 = 0.5;

/// Score above which two agents are strong enough to chain.
pub const SEQUENTIAL_THRESHOLD: f64 = 0.7;

/// Maximum gap between the top two scores for a parallel plan.
pub const PARALLEL_GAP: f64 = 0.15;

const GAP_EPSILON: f64 = 1e-9;

/// Turn scores and the analysis hint into an execution plan.
///
/// Decision table, first match wins:
///
/// | condition | strategy |
/// |---|---|
/// | top two > 0.7 with distinct roles | sequential |
/// | top two within 0.15 and both > 0.5 | parallel |
/// | exactly one > 0.5 | single |
/// | all ≤ 0.5 | orchestrator only |
/// | otherwise | the analysis pattern if sequential or parallel, else single |
///
/// `max_agents < 2` rules out sequential and parallel plans.
pub fn build_plan(
    analysis: &QueryAnalysis,
    scores: &[AgentScore],
    max_agents: usize,
) -> ExecutionPlan {
    let ranked = rank(scores);
    let (strategy, reason) = decide(analysis, &ranked, max_agents);

    let selected: Vec<&AgentScore> = match strategy {
        Strategy::OrchestratorOnly => Vec::new(),
        Strategy::Single => ranked.iter().take(1).copied().collect(),
        Strategy::Sequential | Strategy::Parallel => ranked
            .iter()
            .filter(|s| s.association_score > RELEVANCE_THRESHOLD)
            .take(max_agents)
            .copied()
            .collect(),
    };

    let total = selected.len();
    let ordered_tasks = selected
        .iter()
        .enumerate()
        .map(|(i, score)| PlannedTask {
            agent_id: score.agent_id.clone(),
            agent_name: score.agent_name.clone(),
            order: match strategy {
                Strategy::Parallel => 0,
                _ => i as u32 + 1,
            },
            task_assignment: task_assignment(strategy, analysis, score, i, total),
            score: score.association_score,
        })
        .collect();

    ExecutionPlan {
        strategy,
        ordered_tasks,
        rationale: reason,
    }
}

/// Sort descending by score; the sort is stable so ties keep catalog order.
fn rank(scores: &[AgentScore]) -> Vec<&AgentScore> {
    let mut ranked: Vec<&AgentScore> = scores.iter().collect();
    ranked.sort_by(|a, b| {
        b.association_score
            .partial_cmp(&a.association_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

fn decide(analysis: &QueryAnalysis, ranked: &[&AgentScore], max_agents: usize) -> (Strategy, String) {
    let Some(top) = ranked.first() else {
        return (Strategy::OrchestratorOnly, "no agents available".to_string());
    };
    let multi_allowed = max_agents >= 2;

    if let (true, Some(second)) = (multi_allowed, ranked.get(1)) {
        let (a, b) = (top.association_score, second.association_score);

        if a > SEQUENTIAL_THRESHOLD && b > SEQUENTIAL_THRESHOLD && distinct_roles(top, second) {
            return (
                Strategy::Sequential,
                format!(
                    "{} ({:.2}) and {} ({:.2}) are both strong with distinct roles",
                    top.agent_name, a, second.agent_name, b
                ),
            );
        }

        if (a - b).abs() <= PARALLEL_GAP + GAP_EPSILON
            && a > RELEVANCE_THRESHOLD
            && b > RELEVANCE_THRESHOLD
        {
            return (
                Strategy::Parallel,
                format!(
                    "{} ({:.2}) and {} ({:.2}) are comparably relevant",
                    top.agent_name, a, second.agent_name, b
                ),
            );
        }
    }

    let relevant = ranked
        .iter()
        .filter(|s| s.association_score > RELEVANCE_THRESHOLD)
        .count();

    if relevant == 1 {
        return (
            Strategy::Single,
            format!(
                "only {} ({:.2}) scored above {:.2}",
                top.agent_name, top.association_score, RELEVANCE_THRESHOLD
            ),
        );
    }

    if relevant == 0 {
        return (
            Strategy::OrchestratorOnly,
            format!(
                "no agent scored above {:.2} (best: {} at {:.2})",
                RELEVANCE_THRESHOLD, top.agent_name, top.association_score
            ),
        );
    }

    match analysis.pattern {
        Strategy::Sequential | Strategy::Parallel if multi_allowed => (
            analysis.pattern,
            format!("{} relevant agents; following the analysis pattern", relevant),
        ),
        _ => (
            Strategy::Single,
            format!("{} is the clear best match ({:.2})", top.agent_name, top.association_score),
        ),
    }
}

/// Roles are the same only when both are non-empty and equal after
/// trimming and lowercasing.
fn distinct_roles(a: &AgentScore, b: &AgentScore) -> bool {
    let a = a.role_analysis.trim().to_lowercase();
    let b = b.role_analysis.trim().to_lowercase();
    a.is_empty() || b.is_empty() || a != b
}

fn task_assignment(
    strategy: Strategy,
    analysis: &QueryAnalysis,
    score: &AgentScore,
    index: usize,
    total: usize,
) -> String {
    let role = if score.role_analysis.trim().is_empty() {
        score.agent_name.as_str()
    } else {
        score.role_analysis.trim()
    };
    let intent = analysis.user_intent.trim();

    match strategy {
        Strategy::Sequential if index == 0 => format!(
            "Step 1 of {}. Act as {}. Handle your part of this request: {}. Later agents will build on your answer.",
            total, role, intent
        ),
        Strategy::Sequential => format!(
            "Step {} of {}. Act as {}. Using the earlier agents' findings where relevant, handle your part of this request: {}.",
            index + 1,
            total,
            role,
            intent
        ),
        Strategy::Parallel => format!(
            "Act as {}. Independently address the aspects of this request that match your expertise: {}.",
            role, intent
        ),
        _ => format!("Act as {}. Handle this request in full: {}.", role, intent),
    }
}
