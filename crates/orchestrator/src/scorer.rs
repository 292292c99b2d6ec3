//! Agent relevance scoring: one batched LLM call, keyword fallback.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    strip_reasoning, truncate_chars, AgentDescriptor, GenerateOptions, GenerateRequest,
    LlmBackend, PipelineStage, ReleaseHook, ReleaseReason,
};
use serde::{Deserialize, Deserializer};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::budget::{Bounded, Budget};
use crate::error::ParseError;
use crate::json::parse_tolerant;
use crate::model::{AgentScore, QueryAnalysis, Source};

/// Words ignored by the keyword heuristic.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "what", "how", "please", "about", "into",
    "from", "then", "write", "tell", "give", "can", "you", "are", "was", "its", "your", "some",
    "describe", "make", "want", "need",
];

/// One evaluation as returned by the model.
#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    #[serde(default, alias = "agentId", alias = "id")]
    pub agent_id: Option<String>,
    #[serde(default, alias = "agentName", alias = "name")]
    pub agent_name: Option<String>,
    #[serde(
        default,
        alias = "associationScore",
        alias = "score",
        alias = "relevance",
        deserialize_with = "lenient_score"
    )]
    pub association_score: Option<f64>,
    #[serde(default, alias = "roleAnalysis", alias = "role")]
    pub role_analysis: Option<String>,
    #[serde(
        default,
        alias = "relevanceJustification",
        alias = "justification",
        alias = "reason"
    )]
    pub relevance_justification: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EvaluationPayload {
    Wrapped { evaluations: Vec<Evaluation> },
    List(Vec<Evaluation>),
}

/// Accept numbers, numeric strings and percentages.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
                None => s.parse::<f64>().ok(),
            }
        }
        _ => None,
    })
}

/// Decode the evaluations array from a model response.
pub fn parse_evaluations(text: &str) -> Result<Vec<Evaluation>, ParseError> {
    let evaluations = match parse_tolerant::<EvaluationPayload>(text)? {
        EvaluationPayload::Wrapped { evaluations } | EvaluationPayload::List(evaluations) => {
            evaluations
        }
    };
    if evaluations.is_empty() {
        return Err(ParseError::MissingField("evaluations"));
    }
    Ok(evaluations)
}

/// Scores every catalog agent against a classified query.
pub struct AgentScorer {
    backend: Arc<dyn LlmBackend>,
    release: Arc<dyn ReleaseHook>,
    model: String,
    timeout: Duration,
}

impl AgentScorer {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        release: Arc<dyn ReleaseHook>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            release,
            model: model.into(),
            timeout,
        }
    }

    /// Score `agents`, returning exactly one score per agent in catalog order.
    pub async fn score(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        agents: &[AgentDescriptor],
        budget: &Budget,
    ) -> Vec<AgentScore> {
        if agents.is_empty() {
            debug!("Empty catalog, nothing to score");
            return Vec::new();
        }
        if budget.is_exhausted() {
            debug!("SCORING_SKIPPED");
            return heuristic_scores(query, agents);
        }

        let prompt = build_scoring_prompt(query, analysis, agents);
        trace!(prompt = %prompt, "SCORING_PROMPT");

        let request = GenerateRequest::new(&self.model, prompt)
            .with_options(GenerateOptions::new(0.0, 1024));

        let started = Instant::now();
        let outcome = budget.bound(self.timeout, self.backend.generate(request)).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let reason = ReleaseReason::StageComplete(PipelineStage::Scoring);
        budget.release(self.release.as_ref(), reason, self.timeout).await;

        let scores = match outcome {
            Bounded::Done(Ok(generation)) => {
                trace!(raw_response = %generation.text, "SCORING_RAW_RESPONSE");
                match parse_evaluations(&strip_reasoning(&generation.text)) {
                    Ok(evaluations) => merge_evaluations(query, agents, &evaluations),
                    Err(e) => {
                        warn!(error = %e, latency_ms, "SCORING_PARSE_FAILED");
                        heuristic_scores(query, agents)
                    }
                }
            }
            Bounded::Done(Err(e)) => {
                warn!(error = %e, latency_ms, "SCORING_BACKEND_ERROR");
                heuristic_scores(query, agents)
            }
            other => {
                warn!(outcome = other.label(), latency_ms, "SCORING_TIMEOUT");
                heuristic_scores(query, agents)
            }
        };

        for score in &scores {
            debug!(
                agent_id = %score.agent_id,
                score = score.association_score,
                source = ?score.source,
                "AGENT_SCORED"
            );
        }
        info!(agents = scores.len(), latency_ms, "SCORING_COMPLETE");
        scores
    }
}

/// Build the batched scoring prompt.
pub fn build_scoring_prompt(
    query: &str,
    analysis: &QueryAnalysis,
    agents: &[AgentDescriptor],
) -> String {
    let mut prompt = String::from(
        "You decide which specialist agents should handle a user query.\n\
         Rate every agent below from 0.0 (irrelevant) to 1.0 (perfect fit).\n\n",
    );

    prompt.push_str(&format!("[QUERY]\n{}\n\n", truncate_chars(query.trim(), 2000)));
    prompt.push_str(&format!(
        "[ANALYSIS]\nintent: {}\ndomain: {}\npattern: {}\n\n",
        analysis.user_intent, analysis.domain, analysis.pattern
    ));

    prompt.push_str("[AGENTS]\n");
    for agent in agents {
        prompt.push_str(&format!("- {}\n", agent.summary()));
    }

    prompt.push_str(
        "\nRespond with JSON only, in this shape, with one entry per agent:\n\
         {\"evaluations\": [{\"agent_id\": \"<id>\", \"association_score\": 0.0, \
         \"role_analysis\": \"<the role this agent would play>\", \
         \"relevance_justification\": \"<one sentence>\"}]}",
    );
    prompt
}

/// Match evaluations to agents by id, then by name; fill gaps heuristically.
pub fn merge_evaluations(
    query: &str,
    agents: &[AgentDescriptor],
    evaluations: &[Evaluation],
) -> Vec<AgentScore> {
    let tokens = query_tokens(query);

    agents
        .iter()
        .map(|agent| {
            let matched = find_by_id(agent, evaluations).or_else(|| find_by_name(agent, evaluations));
            match matched.and_then(|e| e.association_score.map(|s| (e, s))) {
                Some((evaluation, score)) => AgentScore::new(
                    agent,
                    score,
                    evaluation
                        .role_analysis
                        .clone()
                        .unwrap_or_else(|| agent.name.clone()),
                    evaluation.relevance_justification.clone().unwrap_or_default(),
                    Source::Model,
                ),
                None => {
                    debug!(agent_id = %agent.id, "Agent missing from evaluations, using heuristic");
                    heuristic_score(agent, &tokens)
                }
            }
        })
        .collect()
}

fn find_by_id<'a>(agent: &AgentDescriptor, evaluations: &'a [Evaluation]) -> Option<&'a Evaluation> {
    evaluations.iter().find(|e| {
        e.agent_id
            .as_deref()
            .is_some_and(|id| id.trim().eq_ignore_ascii_case(&agent.id))
    })
}

fn find_by_name<'a>(
    agent: &AgentDescriptor,
    evaluations: &'a [Evaluation],
) -> Option<&'a Evaluation> {
    let matches_name = |value: Option<&str>| {
        value.is_some_and(|v| v.trim().eq_ignore_ascii_case(agent.name.trim()))
    };
    evaluations
        .iter()
        .find(|e| matches_name(e.agent_name.as_deref()) || matches_name(e.agent_id.as_deref()))
}

/// Keyword-overlap scores for every agent.
pub fn heuristic_scores(query: &str, agents: &[AgentDescriptor]) -> Vec<AgentScore> {
    let tokens = query_tokens(query);
    agents.iter().map(|agent| heuristic_score(agent, &tokens)).collect()
}

/// Weighted hits of query tokens against name (3), capabilities (2) and
/// description (1), normalized by `3 × token count`.
fn heuristic_score(agent: &AgentDescriptor, tokens: &[String]) -> AgentScore {
    let name = agent.name.to_lowercase();
    let capabilities: Vec<String> = agent.capabilities.iter().map(|c| c.to_lowercase()).collect();
    let description = agent.description.to_lowercase();

    let mut hits = 0usize;
    let mut raw = 0.0;
    for token in tokens {
        let mut matched = false;
        if name.contains(token.as_str()) {
            raw += 3.0;
            matched = true;
        }
        if capabilities.iter().any(|c| c.contains(token.as_str())) {
            raw += 2.0;
            matched = true;
        }
        if description.contains(token.as_str()) {
            raw += 1.0;
            matched = true;
        }
        if matched {
            hits += 1;
        }
    }

    let score = if tokens.is_empty() {
        0.0
    } else {
        raw / (3.0 * tokens.len() as f64)
    };

    AgentScore::new(
        agent,
        score,
        agent.name.clone(),
        format!("keyword overlap: {} of {} query terms", hits, tokens.len()),
        Source::Heuristic,
    )
}

/// Lowercased, de-duplicated query words of three or more letters.
fn query_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}
