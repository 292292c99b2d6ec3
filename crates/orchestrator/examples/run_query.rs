//! Run one query through the orchestrator against live HTTP services.
//!
//! Run with: cargo run -p orchestrator --example run_query -- "Summarize this contract"
//!
//! Configuration via .env file or environment variables:
//!   ENSEMBLE_LLM_URL       - OpenAI-compatible endpoint (default: http://localhost:11434)
//!   ENSEMBLE_LLM_API_KEY   - Optional bearer token
//!   ENSEMBLE_CATALOG_URL   - Agent catalog service (default: http://localhost:8080)
//!   ENSEMBLE_INVOKER_URL   - Agent invocation service (default: catalog URL)
//!   ENSEMBLE_MODEL         - Model for every stage (default: qwen3:8b)
//!   ENSEMBLE_*             - See OrchestratorConfig::from_env for the rest

use http_agents::{
    ChatCompletionsBackend, HttpAgentCatalog, HttpAgentInvoker, HttpAgentsConfig, OllamaUnloadHook,
};
use orchestrator::{Orchestrator, OrchestratorConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("orchestrator=info".parse()?)
                .add_directive("http_agents=info".parse()?),
        )
        .init();

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        eprintln!("usage: run_query <query>");
        std::process::exit(2);
    }

    let http = HttpAgentsConfig::from_env()?;
    let config = OrchestratorConfig::from_env();
    info!(llm = %http.llm_url, catalog = %http.catalog_url, model = %config.model, "Starting");

    let orchestrator = Orchestrator::builder(config.clone())
        .backend(ChatCompletionsBackend::new(&http)?)
        .catalog(HttpAgentCatalog::new(&http)?)
        .invoker(HttpAgentInvoker::new(&http)?)
        .release(OllamaUnloadHook::new(&http, &config.model)?)
        .build();

    let shutdown = CancellationToken::new();
    let guard = orchestrator.start_guard(shutdown.clone());

    tokio::select! {
        outcome = orchestrator.run(&query) => {
            let outcome = outcome?;
            info!(session_id = %outcome.session_id, status = ?outcome.status, "Done");
            if let Some(plan) = &outcome.stage_results.plan {
                println!("strategy: {} ({})", plan.strategy, plan.rationale);
            }
            for step in &outcome.stage_results.steps {
                println!(
                    "  [{}] {} {}ms{}",
                    if step.success { "ok" } else { "failed" },
                    step.agent_name,
                    step.duration_ms,
                    step.error.as_deref().map(|e| format!(" ({})", e)).unwrap_or_default()
                );
            }
            println!("\n{}", outcome.final_response);
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling active sessions");
            for session in orchestrator.list_active().await {
                orchestrator.cancel(&session.id).await;
            }
        }
    }

    shutdown.cancel();
    guard.await?;
    Ok(())
}
