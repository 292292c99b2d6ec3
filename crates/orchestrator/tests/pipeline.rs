//! End-to-end runs of the orchestrator against scripted collaborators.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mock_agents::{
    AgentDescriptor, CountingRelease, DelayedBackend, DelayedInvoker, DelayedRelease,
    PipelineStage, ScriptedBackend, ScriptedInvoker, StaticCatalog, UnavailableCatalog,
};
use orchestrator::{
    GuardConfig, MemoryProbe, Orchestrator, OrchestratorConfig, OrchestratorError, SessionId,
    SessionStatus, Strategy, ADVISORY_MESSAGE, APOLOGY_MESSAGE,
};
use serde_json::json;
use tokio::time::{advance, sleep, Instant};

const REASONING_TEMPLATE: &str = "CLASSIFY THIS QUERY\n{query}";
const SYNTHESIS_NEEDLE: &str = "Final answer:";

fn classification(pattern: &str) -> String {
    format!(
        "USER INTENT: get help with the request\nDOMAIN: general\nCOMPLEXITY: moderate\nORCHESTRATION PATTERN: {}",
        pattern
    )
}

fn evaluations(scores: &[(&str, f64, &str)]) -> String {
    let evaluations: Vec<_> = scores
        .iter()
        .map(|(id, score, role)| {
            json!({
                "agent_id": id,
                "association_score": score,
                "role_analysis": role,
                "relevance_justification": "scripted"
            })
        })
        .collect();
    json!({ "evaluations": evaluations }).to_string()
}

fn legal_and_weather() -> StaticCatalog {
    StaticCatalog::new(vec![
        AgentDescriptor::new("legal", "Legal Advisor")
            .with_description("Reviews and summarizes contracts")
            .with_capabilities(["contracts", "compliance"]),
        AgentDescriptor::new("weather", "Weather")
            .with_description("Forecasts and current conditions")
            .with_capabilities(["forecast"]),
    ])
}

fn malaysia_and_singapore() -> StaticCatalog {
    StaticCatalog::new(vec![
        AgentDescriptor::new("malaysia", "Malaysia Guide")
            .with_description("Malaysian food and culture")
            .with_capabilities(["food", "culture"]),
        AgentDescriptor::new("singapore", "Singapore Guide")
            .with_description("Singapore travel and poetry")
            .with_capabilities(["travel", "poems"]),
    ])
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_llm_timeout(Duration::from_secs(5))
        .with_agent_timeout(Duration::from_secs(10))
        .with_overall_timeout(Duration::from_secs(60))
}

fn build(
    config: OrchestratorConfig,
    backend: ScriptedBackend,
    catalog: StaticCatalog,
    invoker: ScriptedInvoker,
    release: CountingRelease,
) -> Orchestrator {
    Orchestrator::builder(config)
        .backend(backend)
        .catalog(catalog)
        .invoker(invoker)
        .release(release)
        .memory_probe(FixedProbe::new(0))
        .reasoning_template(REASONING_TEMPLATE)
        .build()
}

struct FixedProbe(Arc<AtomicU64>);

impl FixedProbe {
    fn new(bytes: u64) -> Self {
        Self(Arc::new(AtomicU64::new(bytes)))
    }
}

impl MemoryProbe for FixedProbe {
    fn resident_bytes(&self) -> Option<u64> {
        Some(self.0.load(Ordering::SeqCst))
    }
}

async fn wait_until_terminal(orchestrator: &Orchestrator, id: &SessionId) -> SessionStatus {
    for _ in 0..200 {
        if let Ok(session) = orchestrator.get_status(id).await {
            if session.status.is_terminal() {
                return session.status;
            }
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("session {} never finished", id);
}

#[tokio::test]
async fn test_single_agent_contract_summary() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.9, "contract reviewer"), ("weather", 0.05, "forecaster")]))
        .when(SYNTHESIS_NEEDLE, "The contract caps liability at $1M.");
    let invoker = ScriptedInvoker::new()
        .reply("legal", "Clause 4 caps liability at $1M.")
        .reply("weather", "Sunny all week.");
    let release = CountingRelease::new();
    let orchestrator = build(config(), backend.clone(), legal_and_weather(), invoker.clone(), release.clone());

    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::Completed);
    let plan = outcome.stage_results.plan.as_ref().unwrap();
    assert_eq!(plan.strategy, Strategy::Single);
    assert_eq!(plan.agent_ids(), vec!["legal"]);
    assert_eq!(invoker.call_count(), 1);
    assert_eq!(outcome.final_response, "The contract caps liability at $1M.");

    let synthesis = backend
        .requests()
        .into_iter()
        .find(|r| r.prompt.contains(SYNTHESIS_NEEDLE))
        .unwrap();
    assert!(synthesis.prompt.contains("Clause 4 caps liability at $1M."));
    assert!(!synthesis.prompt.contains("Sunny"));

    assert_eq!(release.stage_count(PipelineStage::Reasoning), 1);
    assert_eq!(release.stage_count(PipelineStage::Scoring), 1);
    assert_eq!(release.stage_count(PipelineStage::Synthesis), 1);

    let session = orchestrator.get_status(&outcome.session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(
        session.stage_results.final_response.as_deref(),
        Some("The contract caps liability at $1M.")
    );
    assert_eq!(session.stage_results.steps.len(), 1);
}

#[tokio::test]
async fn test_sequential_hands_off_malaysia_output() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("sequential"))
        .when(
            "[AGENTS]",
            evaluations(&[("malaysia", 0.8, "food guide"), ("singapore", 0.75, "travel poet")]),
        )
        .when(SYNTHESIS_NEEDLE, "Food notes and a poem.");
    let invoker = ScriptedInvoker::new()
        .reply("malaysia", "Nasi lemak, rendang and laksa.")
        .reply("singapore", "Under Marina lights, laksa steams.");
    let orchestrator = build(
        config(),
        backend,
        malaysia_and_singapore(),
        invoker.clone(),
        CountingRelease::new(),
    );

    let outcome = orchestrator
        .run("Describe Malaysian food then write a Singapore travel poem")
        .await
        .unwrap();

    let plan = outcome.stage_results.plan.as_ref().unwrap();
    assert_eq!(plan.strategy, Strategy::Sequential);
    assert_eq!(plan.agent_ids(), vec!["malaysia", "singapore"]);

    let order: Vec<String> = invoker.calls().into_iter().map(|c| c.agent_id).collect();
    assert_eq!(order, vec!["malaysia", "singapore"]);
    let singapore_input = invoker.input_for("singapore").unwrap();
    assert!(singapore_input.contains("Nasi lemak, rendang and laksa."));
    assert!(singapore_input.contains("Describe Malaysian food then write a Singapore travel poem"));

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.final_response, "Food notes and a poem.");
}

#[tokio::test]
async fn test_low_scores_give_advisory_without_invocations() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.4, "reviewer"), ("weather", 0.1, "forecaster")]))
        .when(SYNTHESIS_NEEDLE, "should not be called");
    let invoker = ScriptedInvoker::new().reply("legal", "unused");
    let orchestrator = build(config(), backend.clone(), legal_and_weather(), invoker.clone(), CountingRelease::new());

    let outcome = orchestrator.run("What's a good name for a cat?").await.unwrap();

    assert_eq!(outcome.stage_results.plan.as_ref().unwrap().strategy, Strategy::OrchestratorOnly);
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(outcome.final_response, ADVISORY_MESSAGE);
    assert_eq!(outcome.status, SessionStatus::Completed);
    assert!(backend.requests().iter().all(|r| !r.prompt.contains(SYNTHESIS_NEEDLE)));
}

#[tokio::test(start_paused = true)]
async fn test_first_step_timeout_does_not_abort_chain() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("sequential"))
        .when(
            "[AGENTS]",
            evaluations(&[("malaysia", 0.8, "food guide"), ("singapore", 0.75, "travel poet")]),
        );
    let invoker = ScriptedInvoker::new()
        .slow("malaysia", Duration::from_secs(30), "too late")
        .reply("singapore", "Under Marina lights, laksa steams.");
    let orchestrator = build(
        config().with_agent_timeout(Duration::from_secs(2)),
        backend,
        malaysia_and_singapore(),
        invoker.clone(),
        CountingRelease::new(),
    );

    let outcome = orchestrator
        .run("Describe Malaysian food then write a Singapore travel poem")
        .await
        .unwrap();

    let steps = &outcome.stage_results.steps;
    assert_eq!(steps.len(), 2);
    assert!(!steps[0].success);
    assert!(steps[1].success);
    assert_eq!(invoker.call_count(), 2);
    assert_eq!(outcome.status, SessionStatus::Completed);
    assert!(outcome.error.is_none());
    // synthesis has no script, so the fallback carries agent 2's output
    assert_eq!(
        outcome.final_response,
        "### Singapore Guide\n\nUnder Marina lights, laksa steams."
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_unreachable_after_ttl() {
    let guard = GuardConfig {
        session_timeout: Duration::from_secs(300),
        ..GuardConfig::default()
    };
    let orchestrator = build(
        config().with_guard(guard),
        ScriptedBackend::new(),
        legal_and_weather(),
        ScriptedInvoker::new().reply("legal", "ok"),
        CountingRelease::new(),
    );

    let id = orchestrator.submit("Summarize this contract").await.unwrap();
    wait_until_terminal(&orchestrator, &id).await;
    assert!(orchestrator.get_status(&id).await.is_ok());

    advance(Duration::from_secs(301)).await;
    let report = orchestrator.guard().sweep().await;

    assert_eq!(report.expired, vec![id.clone()]);
    let err = orchestrator.get_status(&id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_background_guard_expires_sessions() {
    let orchestrator = build(
        config(),
        ScriptedBackend::new(),
        legal_and_weather(),
        ScriptedInvoker::new(),
        CountingRelease::new(),
    );
    let shutdown = tokio_util::sync::CancellationToken::new();
    let guard = orchestrator.start_guard(shutdown.clone());

    let id = orchestrator.submit("hello").await.unwrap();
    sleep(Duration::from_secs(331)).await;

    assert!(orchestrator.get_status(&id).await.is_err());
    shutdown.cancel();
    guard.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_respects_overall_timeout() {
    let backend = DelayedBackend::with_secs(ScriptedBackend::new().otherwise("late"), 100);
    let invoker = ScriptedInvoker::new()
        .slow("legal", Duration::from_secs(100), "late")
        .slow("weather", Duration::from_secs(100), "late");
    let orchestrator = Orchestrator::builder(
        config()
            .with_llm_timeout(Duration::from_secs(30))
            .with_agent_timeout(Duration::from_secs(60))
            .with_overall_timeout(Duration::from_secs(5)),
    )
    .backend(backend)
    .catalog(legal_and_weather())
    .invoker(invoker)
    .memory_probe(FixedProbe::new(0))
    .reasoning_template(REASONING_TEMPLATE)
    .build();

    let started = Instant::now();
    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(10));
    assert_eq!(outcome.status, SessionStatus::Expired);
    assert!(!outcome.final_response.is_empty());
    assert!(outcome.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_release_after_stalled_stage_keeps_overall_timeout() {
    let backend = DelayedBackend::with_secs(ScriptedBackend::new().otherwise("late"), 100);
    let release = CountingRelease::new();
    let orchestrator = Orchestrator::builder(
        config()
            .with_llm_timeout(Duration::from_secs(30))
            .with_overall_timeout(Duration::from_secs(5)),
    )
    .backend(backend)
    .catalog(legal_and_weather())
    .invoker(ScriptedInvoker::new().reply("legal", "Clause 4 caps liability."))
    .release(DelayedRelease::with_secs(release.clone(), 10))
    .memory_probe(FixedProbe::new(0))
    .reasoning_template(REASONING_TEMPLATE)
    .build();

    let started = Instant::now();
    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(10));
    assert_eq!(outcome.status, SessionStatus::Expired);

    // Nothing is issued once the deadline has passed.
    sleep(Duration::from_secs(11)).await;
    assert!(release.reasons().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_release_is_cut_at_session_deadline() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.9, "reviewer"), ("weather", 0.0, "forecaster")]));
    let orchestrator = Orchestrator::builder(
        config()
            .with_llm_timeout(Duration::from_secs(30))
            .with_overall_timeout(Duration::from_secs(5)),
    )
    .backend(backend)
    .catalog(legal_and_weather())
    .invoker(ScriptedInvoker::new().reply("legal", "Clause 4 caps liability."))
    .release(DelayedRelease::with_secs(CountingRelease::new(), 10))
    .memory_probe(FixedProbe::new(0))
    .reasoning_template(REASONING_TEMPLATE)
    .build();

    let started = Instant::now();
    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(10));
    assert_eq!(outcome.status, SessionStatus::Expired);
    assert!(outcome.stage_results.analysis.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_expires_session() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.9, "reviewer"), ("weather", 0.0, "forecaster")]));
    let invoker = ScriptedInvoker::new().slow("legal", Duration::from_secs(8), "late");
    let orchestrator = build(config(), backend, legal_and_weather(), invoker, CountingRelease::new());

    let runner = orchestrator.clone();
    let run = tokio::spawn(async move { runner.run("Summarize this contract").await });

    sleep(Duration::from_secs(1)).await;
    let active = orchestrator.list_active().await;
    assert_eq!(active.len(), 1);
    assert!(orchestrator.cancel(&active[0].id).await);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome.status, SessionStatus::Expired);
    assert_eq!(outcome.final_response, APOLOGY_MESSAGE);
    assert!(outcome.error.as_deref().unwrap().contains("cancelled"));
    assert!(orchestrator.get_status(&outcome.session_id).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_memory_pressure_evicts_running_session() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.9, "reviewer"), ("weather", 0.0, "forecaster")]));
    let invoker = ScriptedInvoker::new().slow("legal", Duration::from_secs(8), "late");
    let release = CountingRelease::new();
    let probe = FixedProbe::new(0);
    let memory = probe.0.clone();
    let orchestrator = Orchestrator::builder(config())
        .backend(backend)
        .catalog(legal_and_weather())
        .invoker(invoker)
        .release(release.clone())
        .memory_probe(probe)
        .reasoning_template(REASONING_TEMPLATE)
        .build();

    let runner = orchestrator.clone();
    let run = tokio::spawn(async move { runner.run("Summarize this contract").await });
    sleep(Duration::from_secs(1)).await;

    memory.store(u64::MAX, Ordering::SeqCst);
    let report = orchestrator.guard().sweep().await;
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(release.pressure_count(), 1);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome.status, SessionStatus::Expired);
}

#[tokio::test]
async fn test_parallel_plan_invokes_both() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("parallel"))
        .when(
            "[AGENTS]",
            evaluations(&[("malaysia", 0.65, "food guide"), ("singapore", 0.6, "travel guide")]),
        );
    let invoker = ScriptedInvoker::new()
        .reply("malaysia", "Try char kway teow.")
        .reply("singapore", "Visit Gardens by the Bay.");
    let orchestrator = build(
        config(),
        backend,
        malaysia_and_singapore(),
        invoker.clone(),
        CountingRelease::new(),
    );

    let outcome = orchestrator.run("Food in Malaysia and sights in Singapore").await.unwrap();

    assert_eq!(outcome.stage_results.plan.as_ref().unwrap().strategy, Strategy::Parallel);
    assert_eq!(invoker.call_count(), 2);
    let ids: Vec<&str> = outcome.stage_results.steps.iter().map(|s| s.agent_id.as_str()).collect();
    assert_eq!(ids, vec!["malaysia", "singapore"]);
    assert!(!invoker.input_for("singapore").unwrap().contains("char kway teow"));
    assert!(outcome.final_response.contains("### Malaysia Guide"));
    assert!(outcome.final_response.contains("Visit Gardens by the Bay."));
}

#[tokio::test(start_paused = true)]
async fn test_parallel_agents_time_out_together() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("parallel"))
        .when(
            "[AGENTS]",
            evaluations(&[("malaysia", 0.65, "food guide"), ("singapore", 0.6, "travel guide")]),
        );
    let invoker = ScriptedInvoker::new()
        .reply("malaysia", "Try char kway teow.")
        .reply("singapore", "Visit Gardens by the Bay.");
    let orchestrator = Orchestrator::builder(config().with_agent_timeout(Duration::from_secs(10)))
        .backend(backend)
        .catalog(malaysia_and_singapore())
        .invoker(DelayedInvoker::new(invoker.clone(), Duration::from_secs(12)))
        .memory_probe(FixedProbe::new(0))
        .reasoning_template(REASONING_TEMPLATE)
        .build();

    let started = Instant::now();
    let outcome = orchestrator.run("Food in Malaysia and sights in Singapore").await.unwrap();

    assert_eq!(outcome.stage_results.plan.as_ref().unwrap().strategy, Strategy::Parallel);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(outcome.stage_results.steps.len(), 2);
    for step in &outcome.stage_results.steps {
        assert!(!step.success);
        assert!(step.error.as_deref().unwrap().contains("timed out"));
    }
    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.final_response, APOLOGY_MESSAGE);
}

#[tokio::test]
async fn test_all_agents_failing_yields_apology() {
    let backend = ScriptedBackend::new()
        .when("CLASSIFY THIS QUERY", classification("single"))
        .when("[AGENTS]", evaluations(&[("legal", 0.9, "reviewer"), ("weather", 0.0, "forecaster")]));
    let invoker = ScriptedInvoker::new().fail("legal", "agent crashed");
    let orchestrator = build(config(), backend, legal_and_weather(), invoker, CountingRelease::new());

    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    assert_eq!(outcome.status, SessionStatus::Completed);
    assert_eq!(outcome.final_response, APOLOGY_MESSAGE);
    assert_eq!(outcome.error.as_deref(), Some("agent legal failed: agent crashed"));
}

#[tokio::test]
async fn test_backend_down_uses_heuristics() {
    let invoker = ScriptedInvoker::new().reply("legal", "Clause 4 caps liability.");
    let orchestrator = build(
        config(),
        ScriptedBackend::unavailable(),
        legal_and_weather(),
        invoker.clone(),
        CountingRelease::new(),
    );

    let outcome = orchestrator.run("Summarize this contract").await.unwrap();

    let results = &outcome.stage_results;
    assert_eq!(results.plan.as_ref().unwrap().agent_ids(), vec!["legal"]);
    assert_eq!(outcome.final_response, "### Legal Advisor\n\nClause 4 caps liability.");
    assert_eq!(outcome.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_catalog_unavailable_fails_session() {
    let orchestrator = Orchestrator::builder(config())
        .catalog(UnavailableCatalog)
        .memory_probe(FixedProbe::new(0))
        .reasoning_template(REASONING_TEMPLATE)
        .build();

    let err = orchestrator.run("anything").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::BackendUnavailable(_)));

    let id = orchestrator.submit("anything").await.unwrap();
    assert_eq!(wait_until_terminal(&orchestrator, &id).await, SessionStatus::Failed);
    let session = orchestrator.get_status(&id).await.unwrap();
    assert!(session.error.unwrap().contains("catalog offline"));
    assert!(session.stage_results.final_response.is_none());
}
