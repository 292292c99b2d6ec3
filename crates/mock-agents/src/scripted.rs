//! Scripted LLM backend - answers prompts by substring rules.

use std::sync::{Arc, Mutex};

use agent_core::{async_trait, BackendError, GenerateRequest, Generation, LlmBackend};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Unavailable(String),
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Reply,
}

/// A backend that answers by matching substrings of the prompt.
///
/// Rules are checked in registration order against the prompt (and the
/// system prompt, if any); the first match wins. Unmatched prompts get the
/// fallback reply, which defaults to a backend-unavailable error so that
/// unscripted stages exercise their heuristic paths.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    rules: Vec<Rule>,
    fallback: Reply,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    /// Create a backend with no rules.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Unavailable("no scripted reply".to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a backend that fails every call as unavailable.
    pub fn unavailable() -> Self {
        Self::new()
    }

    /// Reply with `response` when the prompt contains `needle`.
    pub fn when(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Reply::Text(response.into()),
        });
        self
    }

    /// Fail as unavailable when the prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.rules.push(Rule {
            reply: Reply::Unavailable(format!("scripted failure for '{}'", needle)),
            needle,
        });
        self
    }

    /// Reply with `response` to any prompt no rule matched.
    pub fn otherwise(mut self, response: impl Into<String>) -> Self {
        self.fallback = Reply::Text(response.into());
        self
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn reply_for(&self, request: &GenerateRequest) -> &Reply {
        let system = request.system.as_deref().unwrap_or("");
        self.rules
            .iter()
            .find(|rule| request.prompt.contains(&rule.needle) || system.contains(&rule.needle))
            .map(|rule| &rule.reply)
            .unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        let reply = self.reply_for(&request).clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match reply {
            Reply::Text(text) => Ok(Generation::new(text)),
            Reply::Unavailable(reason) => Err(BackendError::Unavailable(reason)),
        }
    }

    fn name(&self) -> &str {
        "ScriptedBackend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let backend = ScriptedBackend::new()
            .when("food", "first")
            .when("food", "second");

        let generation = backend
            .generate(GenerateRequest::new("m", "tell me about food"))
            .await
            .unwrap();
        assert_eq!(generation.text, "first");
    }

    #[tokio::test]
    async fn test_unmatched_is_unavailable_by_default() {
        let backend = ScriptedBackend::new().when("food", "yum");

        let err = backend
            .generate(GenerateRequest::new("m", "weather?"))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_otherwise_and_recording() {
        let backend = ScriptedBackend::new().otherwise("default");

        backend.generate(GenerateRequest::new("m", "one")).await.unwrap();
        backend.generate(GenerateRequest::new("m", "two")).await.unwrap();

        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.requests()[1].prompt, "two");
    }

    #[tokio::test]
    async fn test_fail_when() {
        let backend = ScriptedBackend::new().fail_when("SYNTH").otherwise("ok");

        assert!(backend
            .generate(GenerateRequest::new("m", "SYNTH please"))
            .await
            .is_err());
        assert!(backend.generate(GenerateRequest::new("m", "other")).await.is_ok());
    }

    #[tokio::test]
    async fn test_matches_system_prompt() {
        let backend = ScriptedBackend::new().when("classifier", "classified");

        let generation = backend
            .generate(GenerateRequest::new("m", "query").with_system("You are a classifier"))
            .await
            .unwrap();
        assert_eq!(generation.text, "classified");
    }
}
