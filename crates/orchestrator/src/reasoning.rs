//! Query classification with a keyword fallback.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    strip_reasoning, truncate_chars, GenerateOptions, GenerateRequest, LlmBackend, PipelineStage,
    PromptOrigin, PromptTemplate, ReleaseHook, ReleaseReason,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::budget::{Budget, Bounded};
use crate::config::OrchestratorConfig;
use crate::error::ParseError;
use crate::model::{Complexity, QueryAnalysis, Source, Strategy};

/// Placeholder replaced with the user query.
const QUERY_PLACEHOLDER: &str = "{query}";

/// Default reasoning prompt (fallback if no override is configured).
pub const DEFAULT_REASONING_PROMPT: &str = r#"You are the planning step of a multi-agent assistant. Read the user's query and classify it.

Answer with exactly these four lines and nothing else:
USER INTENT: <one sentence describing what the user wants>
DOMAIN: <one or two words, e.g. legal, travel, food, finance, weather, technology>
COMPLEXITY: <simple | moderate | complex>
ORCHESTRATION PATTERN: <single | sequential | parallel | orchestrator only>

Pattern guide:
- single: one specialist can answer the whole query
- sequential: the query has parts where a later part builds on an earlier one
- parallel: the query has independent parts that different specialists can answer at once
- orchestrator only: no specialist is needed

User query:
{query}"#;

/// Domain vocabulary for the keyword classifier.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    ("legal", &["contract", "legal", "law", "clause", "agreement", "liability", "lawsuit"]),
    ("finance", &["price", "stock", "invest", "budget", "tax", "finance", "money", "bitcoin"]),
    ("weather", &["weather", "forecast", "temperature", "rain", "snow", "climate"]),
    ("travel", &["travel", "trip", "flight", "hotel", "visit", "itinerary", "tour"]),
    ("food", &["food", "recipe", "cook", "cuisine", "restaurant", "dish", "meal"]),
    ("technology", &["code", "software", "program", "bug", "computer", "api", "rust"]),
    ("health", &["health", "medical", "symptom", "doctor", "diet", "exercise"]),
    ("creative", &["poem", "story", "song", "essay", "lyrics", "haiku"]),
];

/// Connectors that usually split a query into dependent parts.
const MULTI_PART_CONNECTORS: &[&str] = &[
    " then ",
    " after that ",
    " followed by ",
    " and also ",
    " as well as ",
    "; ",
];

/// Resolve the reasoning prompt from `config`: inline text, then the
/// prompt file, then [`DEFAULT_REASONING_PROMPT`].
pub fn reasoning_prompt(config: &OrchestratorConfig) -> PromptTemplate {
    let template = PromptTemplate::resolve(
        config.reasoning_prompt.as_deref(),
        config.reasoning_prompt_file.as_deref(),
        DEFAULT_REASONING_PROMPT,
    );
    info!(origin = %template.origin(), "Reasoning prompt loaded");
    template
}

/// Classifies queries with one LLM call, falling back to keywords.
///
/// Never fails: a backend error, timeout or unparsable answer yields a
/// heuristic [`QueryAnalysis`].
pub struct ReasoningStage {
    backend: Arc<dyn LlmBackend>,
    release: Arc<dyn ReleaseHook>,
    model: String,
    timeout: Duration,
    max_query_chars: usize,
    template: PromptTemplate,
}

impl ReasoningStage {
    /// `{query}` in the template is replaced with the query; a template
    /// without the placeholder gets the query appended.
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        release: Arc<dyn ReleaseHook>,
        model: impl Into<String>,
        timeout: Duration,
        max_query_chars: usize,
        template: PromptTemplate,
    ) -> Self {
        info!(fingerprint = template.fingerprint(), "Reasoning prompt fingerprint");
        Self {
            backend,
            release,
            model: model.into(),
            timeout,
            max_query_chars,
            template,
        }
    }

    /// Create a stage from inline template text.
    pub fn with_template(
        backend: Arc<dyn LlmBackend>,
        release: Arc<dyn ReleaseHook>,
        model: impl Into<String>,
        timeout: Duration,
        max_query_chars: usize,
        template: impl Into<String>,
    ) -> Self {
        let template = PromptTemplate::new(template, PromptOrigin::Inline);
        Self::new(backend, release, model, timeout, max_query_chars, template)
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Render the prompt for `query`, bounded to `max_query_chars`.
    pub fn render_prompt(&self, query: &str) -> String {
        let query = truncate_chars(query.trim(), self.max_query_chars);
        self.template.render(QUERY_PLACEHOLDER, "User query", &query)
    }

    /// Classify `query`.
    pub async fn analyze(&self, query: &str, budget: &Budget) -> QueryAnalysis {
        if budget.is_exhausted() {
            debug!("REASONING_SKIPPED");
            return heuristic_analysis(query);
        }

        let prompt = self.render_prompt(query);
        trace!(prompt = %prompt, "REASONING_PROMPT");

        let request = GenerateRequest::new(&self.model, prompt)
            .with_options(GenerateOptions::new(0.0, 256));

        let started = Instant::now();
        let outcome = budget.bound(self.timeout, self.backend.generate(request)).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let reason = ReleaseReason::StageComplete(PipelineStage::Reasoning);
        budget.release(self.release.as_ref(), reason, self.timeout).await;

        let analysis = match outcome {
            Bounded::Done(Ok(generation)) => {
                trace!(raw_response = %generation.text, "REASONING_RAW_RESPONSE");
                match parse_analysis(&strip_reasoning(&generation.text)) {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        warn!(error = %e, latency_ms, "REASONING_PARSE_FAILED");
                        heuristic_analysis(query)
                    }
                }
            }
            Bounded::Done(Err(e)) => {
                warn!(error = %e, latency_ms, backend = self.backend.name(), "REASONING_BACKEND_ERROR");
                heuristic_analysis(query)
            }
            other => {
                warn!(outcome = other.label(), latency_ms, "REASONING_TIMEOUT");
                heuristic_analysis(query)
            }
        };

        info!(
            domain = %analysis.domain,
            pattern = %analysis.pattern,
            complexity = ?analysis.complexity,
            source = ?analysis.source,
            latency_ms,
            "REASONING_COMPLETE"
        );
        analysis
    }
}

/// Parse the four-line classification answer.
///
/// Field prefixes are matched case-insensitively, after stripping list
/// markers and markdown emphasis. Intent and pattern are required.
pub fn parse_analysis(text: &str) -> Result<QueryAnalysis, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut intent = None;
    let mut domain = None;
    let mut complexity = None;
    let mut pattern = None;

    for line in text.lines() {
        let Some((key, value)) = split_field(line) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        match key.as_str() {
            "user intent" | "intent" => intent = intent.or(Some(value)),
            "domain" => domain = domain.or(Some(value)),
            "complexity" => complexity = complexity.or_else(|| Complexity::from_label(&value)),
            "orchestration pattern" | "execution pattern" | "pattern" => {
                pattern = pattern.or_else(|| Strategy::from_label(&value))
            }
            _ => {}
        }
    }

    let user_intent = intent.ok_or(ParseError::MissingField("user intent"))?;
    let pattern = pattern.ok_or(ParseError::MissingField("orchestration pattern"))?;

    Ok(QueryAnalysis {
        user_intent,
        domain: domain
            .map(|d| d.to_lowercase())
            .unwrap_or_else(|| "general".to_string()),
        complexity: complexity.unwrap_or(Complexity::Moderate),
        pattern,
        source: Source::Model,
    })
}

/// Split `- **USER INTENT:** value` into (`user intent`, `value`).
fn split_field(line: &str) -> Option<(String, String)> {
    let line = strip_list_marker(line.trim());
    let (key, value) = line.split_once(':')?;

    let key = clean_markup(key).to_lowercase();
    let key = key.split_whitespace().collect::<Vec<_>>().join(" ");
    let value = clean_markup(value).to_string();
    Some((key, value))
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim_start_matches(['-', '*', '•', '>']).trim_start();
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }
    line
}

fn clean_markup(s: &str) -> &str {
    s.trim().trim_matches(['*', '_', '#', '`', '"']).trim()
}

/// Deterministic keyword classifier.
pub fn heuristic_analysis(query: &str) -> QueryAnalysis {
    let lower = format!(" {} ", query.to_lowercase());

    let domain = DOMAIN_KEYWORDS
        .iter()
        .map(|(domain, words)| (*domain, words.iter().filter(|w| lower.contains(*w)).count()))
        .filter(|(_, hits)| *hits > 0)
        .fold(None::<(&str, usize)>, |best, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
        .map(|(domain, _)| domain)
        .unwrap_or("general");

    let words = query.split_whitespace().count();
    let connectors = MULTI_PART_CONNECTORS
        .iter()
        .map(|c| lower.matches(c).count())
        .sum::<usize>();

    let complexity = if words > 60 || connectors >= 2 {
        Complexity::Complex
    } else if words > 20 || connectors == 1 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    };

    let intent = query.split_whitespace().collect::<Vec<_>>().join(" ");

    QueryAnalysis {
        user_intent: truncate_chars(&intent, 200),
        domain: domain.to_string(),
        complexity,
        pattern: Strategy::Single,
        source: Source::Heuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::NoopRelease;
    use mock_agents::{CountingRelease, DelayedBackend, ScriptedBackend};

    fn stage(backend: impl LlmBackend + 'static) -> ReasoningStage {
        ReasoningStage::with_template(
            Arc::new(backend),
            Arc::new(NoopRelease),
            "test-model",
            Duration::from_secs(5),
            2000,
            DEFAULT_REASONING_PROMPT,
        )
    }

    #[test]
    fn test_parse_clean_answer() {
        let text = "USER INTENT: Summarize a contract\nDOMAIN: Legal\nCOMPLEXITY: simple\nORCHESTRATION PATTERN: single";
        let analysis = parse_analysis(text).unwrap();

        assert_eq!(analysis.user_intent, "Summarize a contract");
        assert_eq!(analysis.domain, "legal");
        assert_eq!(analysis.complexity, Complexity::Simple);
        assert_eq!(analysis.pattern, Strategy::Single);
        assert_eq!(analysis.source, Source::Model);
    }

    #[test]
    fn test_parse_markdown_and_synonyms() {
        let text = "Sure! Here is my analysis:\n\n\
            1. **User Intent:** Plan a food tour and a poem\n\
            - **Domain**: travel\n\
            * complexity: High\n\
            - **Orchestration Pattern:** orchestrator_only\n";
        let analysis = parse_analysis(text).unwrap();

        assert_eq!(analysis.user_intent, "Plan a food tour and a poem");
        assert_eq!(analysis.complexity, Complexity::Complex);
        assert_eq!(analysis.pattern, Strategy::OrchestratorOnly);
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(parse_analysis(""), Err(ParseError::Empty));
        assert_eq!(
            parse_analysis("DOMAIN: legal\nORCHESTRATION PATTERN: single"),
            Err(ParseError::MissingField("user intent"))
        );
        assert_eq!(
            parse_analysis("USER INTENT: x\nORCHESTRATION PATTERN: sometimes"),
            Err(ParseError::MissingField("orchestration pattern"))
        );
    }

    #[test]
    fn test_heuristic_domain_and_complexity() {
        let analysis = heuristic_analysis("Summarize this contract");
        assert_eq!(analysis.domain, "legal");
        assert_eq!(analysis.complexity, Complexity::Simple);
        assert_eq!(analysis.pattern, Strategy::Single);
        assert_eq!(analysis.source, Source::Heuristic);

        let analysis = heuristic_analysis(
            "Describe Malaysian food then write a Singapore travel poem",
        );
        assert_eq!(analysis.complexity, Complexity::Moderate);

        let analysis = heuristic_analysis("hello there");
        assert_eq!(analysis.domain, "general");
    }

    #[test]
    fn test_render_prompt_truncates_query() {
        let stage = ReasoningStage::with_template(
            Arc::new(ScriptedBackend::new()),
            Arc::new(NoopRelease),
            "m",
            Duration::from_secs(1),
            5,
            "Classify: {query}",
        );
        assert_eq!(stage.render_prompt("abcdefghij"), "Classify: abcde…");
    }

    #[test]
    fn test_render_prompt_without_placeholder() {
        let stage = ReasoningStage::with_template(
            Arc::new(ScriptedBackend::new()),
            Arc::new(NoopRelease),
            "m",
            Duration::from_secs(1),
            100,
            "Classify the query.",
        );
        assert_eq!(
            stage.render_prompt("weather?"),
            "Classify the query.\n\nUser query:\nweather?"
        );
    }

    #[test]
    fn test_prompt_from_config() {
        let config = OrchestratorConfig::default()
            .with_reasoning_prompt_file("/nonexistent/reasoning.md");
        let template = reasoning_prompt(&config);
        assert_eq!(template.origin(), &PromptOrigin::Builtin);
        assert_eq!(template.text(), DEFAULT_REASONING_PROMPT);

        let template = reasoning_prompt(&config.with_reasoning_prompt("Label this: {query}"));
        assert_eq!(template.origin(), &PromptOrigin::Inline);
        assert_eq!(template.render(QUERY_PLACEHOLDER, "User query", "hi"), "Label this: hi");
    }

    #[tokio::test]
    async fn test_analyze_uses_model_answer() {
        let backend = ScriptedBackend::new().when(
            "User query",
            "<think>hmm</think>USER INTENT: get weather\nDOMAIN: weather\nCOMPLEXITY: simple\nORCHESTRATION PATTERN: single",
        );
        let analysis = stage(backend).analyze("weather in Paris?", &Budget::unbounded()).await;

        assert_eq!(analysis.source, Source::Model);
        assert_eq!(analysis.domain, "weather");
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_backend_error() {
        let analysis = stage(ScriptedBackend::unavailable())
            .analyze("Summarize this contract", &Budget::unbounded())
            .await;

        assert_eq!(analysis.source, Source::Heuristic);
        assert_eq!(analysis.domain, "legal");
    }

    #[tokio::test]
    async fn test_analyze_falls_back_on_garbage() {
        let analysis = stage(ScriptedBackend::new().otherwise("I cannot help with that."))
            .analyze("Summarize this contract", &Budget::unbounded())
            .await;
        assert_eq!(analysis.source, Source::Heuristic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_analyze_times_out_and_releases() {
        let release = CountingRelease::new();
        let backend = DelayedBackend::with_secs(ScriptedBackend::new().otherwise("late"), 60);
        let stage = ReasoningStage::with_template(
            Arc::new(backend),
            Arc::new(release.clone()),
            "m",
            Duration::from_secs(2),
            2000,
            DEFAULT_REASONING_PROMPT,
        );

        let started = Instant::now();
        let analysis = stage.analyze("weather?", &Budget::unbounded()).await;

        assert_eq!(analysis.source, Source::Heuristic);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(release.stage_count(PipelineStage::Reasoning), 1);
    }
}
