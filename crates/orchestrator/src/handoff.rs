//! Context handed from one agent to the next.

use agent_core::strip_reasoning;

/// Output of an earlier agent in a sequential chain.
#[derive(Debug, Clone)]
struct PriorOutput {
    agent_name: String,
    output: String,
}

/// Accumulates prior agent outputs and renders the input for the next agent.
///
/// The prior-outputs section is capped at `max_chars`, keeping its tail so the
/// most recent output survives.
#[derive(Debug, Clone)]
pub struct HandoffContext {
    query: String,
    prior: Vec<PriorOutput>,
    refined: Option<String>,
    max_chars: usize,
}

impl HandoffContext {
    pub fn new(query: impl Into<String>, max_chars: usize) -> Self {
        Self {
            query: query.into(),
            prior: Vec::new(),
            refined: None,
            max_chars,
        }
    }

    /// Add a successful agent output, with reasoning blocks removed.
    pub fn record(&mut self, agent_name: &str, output: &str) {
        let output = strip_reasoning(output);
        if output.trim().is_empty() {
            return;
        }
        self.prior.push(PriorOutput {
            agent_name: agent_name.to_string(),
            output,
        });
    }

    /// Drop everything accumulated so far.
    ///
    /// Called after a failed step: the next agent starts from the query alone.
    pub fn reset(&mut self) {
        self.prior.clear();
        self.refined = None;
    }

    /// Replace the accumulated outputs with a condensed version.
    ///
    /// Outputs recorded after this call are appended to the condensed text.
    pub fn replace_with_refined(&mut self, summary: impl Into<String>) {
        self.prior.clear();
        self.refined = Some(summary.into());
    }

    pub fn has_prior(&self) -> bool {
        self.refined.is_some() || !self.prior.is_empty()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// The capped prior-outputs section, or `None` when nothing was recorded.
    pub fn prior_section(&self) -> Option<String> {
        if !self.has_prior() {
            return None;
        }

        let mut section = String::new();
        if let Some(refined) = &self.refined {
            section.push_str(refined.trim());
            section.push_str("\n\n");
        }
        for prior in &self.prior {
            section.push_str(&format!("--- {} ---\n{}\n\n", prior.agent_name, prior.output.trim()));
        }

        Some(keep_tail(section.trim_end(), self.max_chars))
    }

    /// Render the full input for an agent with the given task assignment.
    pub fn render(&self, assignment: &str) -> String {
        let mut text = format!("[ORIGINAL QUERY]\n{}\n\n", self.query.trim());

        if let Some(prior) = self.prior_section() {
            text.push_str("[PRIOR AGENT OUTPUTS]\n");
            text.push_str(&prior);
            text.push_str("\n\n");
        }

        text.push_str("[YOUR TASK]\n");
        text.push_str(assignment.trim());
        text
    }

    /// Prompt asking the model to condense the accumulated outputs.
    pub fn refinement_prompt(&self) -> Option<String> {
        let prior = self.prior_section()?;
        Some(format!(
            "Condense the agent outputs below into a focused brief for the next agent working on \
the user's request. Keep every concrete fact, name and figure that bears on the request. \
Drop repetition and filler. Reply with the brief only, in at most {} characters.\n\n\
[ORIGINAL QUERY]\n{}\n\n[AGENT OUTPUTS]\n{}",
            self.max_chars,
            self.query.trim(),
            prior
        ))
    }

    /// One-line description for logs.
    pub fn format_summary(&self) -> String {
        match (&self.refined, self.prior.len()) {
            (None, 0) => "no prior outputs".to_string(),
            (None, n) => format!("{} prior output(s)", n),
            (Some(_), n) => format!("refined brief + {} prior output(s)", n),
        }
    }
}

/// Keep the last `max_chars` characters, marking the cut with a leading ellipsis.
fn keep_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let skip = total - max_chars;
    let tail: String = text.chars().skip(skip).collect();
    format!("…{}", tail)
}
