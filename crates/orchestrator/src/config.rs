//! Orchestrator configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default model used for every LLM-backed stage.
pub const DEFAULT_MODEL: &str = "qwen3:8b";

/// Default path for the reasoning prompt file.
pub const DEFAULT_REASONING_PROMPT_FILE: &str = "REASONING_PROMPT.md";

/// Settings for the background [`MemoryGuard`](crate::MemoryGuard).
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Sessions older than this are removed.
    pub session_timeout: Duration,
    /// Resident memory above which the oldest active sessions are evicted.
    pub memory_threshold_bytes: u64,
    /// How many active sessions to evict per sweep under memory pressure.
    pub evict_batch: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            session_timeout: Duration::from_secs(300),
            memory_threshold_bytes: 4096 * 1024 * 1024,
            evict_batch: 2,
        }
    }
}

/// Settings for the orchestration pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model name passed to the LLM backend.
    pub model: String,
    /// Maximum number of agents in a plan (K).
    pub max_agents: usize,
    /// Timeout for each LLM call.
    pub llm_timeout: Duration,
    /// Timeout for each agent invocation.
    pub agent_timeout: Duration,
    /// Deadline for a whole session, from submission to final response.
    pub overall_timeout: Duration,
    /// Run a refinement call between sequential hand-offs.
    pub refine_context: bool,
    /// Upper bound on the context handed to the next sequential agent.
    pub max_context_chars: usize,
    /// Upper bound on the query embedded in the reasoning prompt.
    pub max_query_chars: usize,
    /// Reasoning prompt text; wins over the prompt file.
    pub reasoning_prompt: Option<String>,
    /// File read for the reasoning prompt when no inline text is set.
    pub reasoning_prompt_file: Option<PathBuf>,
    /// Background guard settings.
    pub guard: GuardConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_agents: 2,
            llm_timeout: Duration::from_secs(30),
            agent_timeout: Duration::from_secs(60),
            overall_timeout: Duration::from_secs(180),
            refine_context: true,
            max_context_chars: 4000,
            max_query_chars: 2000,
            reasoning_prompt: None,
            reasoning_prompt_file: Some(PathBuf::from(DEFAULT_REASONING_PROMPT_FILE)),
            guard: GuardConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load settings from `ENSEMBLE_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = env::var("ENSEMBLE_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Some(value) = env_usize("ENSEMBLE_MAX_AGENTS") {
            config.max_agents = value;
        }
        if let Some(secs) = env_u64("ENSEMBLE_LLM_TIMEOUT_SECS") {
            config.llm_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ENSEMBLE_AGENT_TIMEOUT_SECS") {
            config.agent_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("ENSEMBLE_OVERALL_TIMEOUT_SECS") {
            config.overall_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = env_bool("ENSEMBLE_REFINE_CONTEXT") {
            config.refine_context = value;
        }
        if let Some(value) = env_usize("ENSEMBLE_MAX_CONTEXT_CHARS") {
            config.max_context_chars = value;
        }
        if let Some(value) = env_usize("ENSEMBLE_MAX_QUERY_CHARS") {
            config.max_query_chars = value;
        }
        if let Ok(prompt) = env::var("ENSEMBLE_REASONING_PROMPT") {
            if !prompt.trim().is_empty() {
                config.reasoning_prompt = Some(prompt);
            }
        }
        if let Ok(path) = env::var("ENSEMBLE_REASONING_PROMPT_FILE") {
            if !path.trim().is_empty() {
                config.reasoning_prompt_file = Some(PathBuf::from(path.trim()));
            }
        }

        if let Some(secs) = env_u64("ENSEMBLE_GUARD_INTERVAL_SECS") {
            config.guard.interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_u64("ENSEMBLE_SESSION_TIMEOUT_SECS") {
            config.guard.session_timeout = Duration::from_secs(secs);
        }
        if let Some(mb) = env_u64("ENSEMBLE_MEMORY_THRESHOLD_MB") {
            config.guard.memory_threshold_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(value) = env_usize("ENSEMBLE_EVICT_BATCH") {
            config.guard.evict_batch = value;
        }

        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_agents(mut self, max_agents: usize) -> Self {
        self.max_agents = max_agents;
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_refine_context(mut self, enabled: bool) -> Self {
        self.refine_context = enabled;
        self
    }

    pub fn with_max_context_chars(mut self, chars: usize) -> Self {
        self.max_context_chars = chars;
        self
    }

    pub fn with_max_query_chars(mut self, chars: usize) -> Self {
        self.max_query_chars = chars;
        self
    }

    pub fn with_reasoning_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.reasoning_prompt = Some(prompt.into());
        self
    }

    pub fn with_reasoning_prompt_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.reasoning_prompt_file = Some(path.into());
        self
    }

    pub fn with_guard(mut self, guard: GuardConfig) -> Self {
        self.guard = guard;
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.trim().parse::<usize>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}
