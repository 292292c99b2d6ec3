//! Final answer composition.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    strip_reasoning, truncate_chars, GenerateOptions, GenerateRequest, LlmBackend, PipelineStage,
    ReleaseHook, ReleaseReason,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::budget::{Bounded, Budget};
use crate::model::{ExecutionStep, APOLOGY_MESSAGE};

/// Per-output bound inside the synthesis prompt.
const MAX_OUTPUT_CHARS: usize = 6000;

/// Merges successful step outputs into one answer.
pub struct ResponseSynthesizer {
    backend: Arc<dyn LlmBackend>,
    release: Arc<dyn ReleaseHook>,
    model: String,
    timeout: Duration,
}

impl ResponseSynthesizer {
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

    /// Compose the final answer. Never returns an empty string.
    pub async fn synthesize(&self, query: &str, steps: &[ExecutionStep], budget: &Budget) -> String {
        let successes: Vec<&ExecutionStep> = steps.iter().filter(|s| s.success).collect();

        if successes.is_empty() {
            info!(steps = steps.len(), "SYNTHESIS_NO_SUCCESS");
            return APOLOGY_MESSAGE.to_string();
        }

        if successes.iter().all(|s| s.advisory) {
            debug!("SYNTHESIS_ADVISORY");
            return fallback(steps);
        }

        let outputs = agent_outputs(steps);
        if outputs.is_empty() {
            return fallback(steps);
        }
        if budget.is_exhausted() {
            debug!("SYNTHESIS_SKIPPED");
            return fallback(steps);
        }

        let prompt = build_synthesis_prompt(query, &outputs);
        trace!(prompt = %prompt, "SYNTHESIS_PROMPT");

        let request = GenerateRequest::new(&self.model, prompt)
            .with_options(GenerateOptions::new(0.3, 2048));

        let started = Instant::now();
        let outcome = budget.bound(self.timeout, self.backend.generate(request)).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let reason = ReleaseReason::StageComplete(PipelineStage::Synthesis);
        budget.release(self.release.as_ref(), reason, self.timeout).await;

        match outcome {
            Bounded::Done(Ok(generation)) => {
                let answer = strip_reasoning(&generation.text);
                let answer = answer.trim();
                if answer.is_empty() {
                    warn!(latency_ms, "SYNTHESIS_EMPTY");
                    fallback(steps)
                } else {
                    info!(latency_ms, chars = answer.chars().count(), "SYNTHESIS_COMPLETE");
                    answer.to_string()
                }
            }
            Bounded::Done(Err(e)) => {
                warn!(error = %e, latency_ms, "SYNTHESIS_BACKEND_ERROR");
                fallback(steps)
            }
            other => {
                warn!(outcome = other.label(), latency_ms, "SYNTHESIS_TIMEOUT");
                fallback(steps)
            }
        }
    }
}

/// Build an answer from the successful outputs without calling the model.
///
/// Every output is placed under a `### {agent name}` header, in step order.
/// With no agent output the advisory text is passed through, else the
/// apology is returned.
pub fn fallback(steps: &[ExecutionStep]) -> String {
    let outputs = agent_outputs(steps);

    match outputs.as_slice() {
        [] => steps
            .iter()
            .find(|s| s.success && s.advisory && !s.output_text.trim().is_empty())
            .map(|s| s.output_text.trim().to_string())
            .unwrap_or_else(|| APOLOGY_MESSAGE.to_string()),
        outputs => outputs
            .iter()
            .map(|(name, output)| format!("### {}\n\n{}", name, output))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

/// Successful, non-advisory outputs with reasoning removed, skipping blanks.
fn agent_outputs(steps: &[ExecutionStep]) -> Vec<(&str, String)> {
    steps
        .iter()
        .filter(|s| s.success && !s.advisory)
        .filter_map(|s| {
            let text = strip_reasoning(&s.output_text);
            let text = text.trim();
            (!text.is_empty()).then(|| (s.agent_name.as_str(), text.to_string()))
        })
        .collect()
}

fn build_synthesis_prompt(query: &str, outputs: &[(&str, String)]) -> String {
    let mut prompt = String::from(
        "You are writing the final answer to a user's request. Specialist agents have already \
worked on it; their outputs follow. Combine them into one cohesive, well-organized answer that \
fully addresses the request. Use only information from the outputs. Do not mention the agents \
or this process.\n\n",
    );
    prompt.push_str(&format!("[USER QUERY]\n{}\n\n[AGENT OUTPUTS]\n", query.trim()));
    for (name, output) in outputs {
        prompt.push_str(&format!(
            "--- {} ---\n{}\n\n",
            name,
            truncate_chars(output, MAX_OUTPUT_CHARS)
        ));
    }
    prompt.push_str("Final answer:");
    prompt
}
