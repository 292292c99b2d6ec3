//! The LLM backend trait and its request/response records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Sampling options for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Temperature for generation (0.0 - 2.0).
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

impl GenerateOptions {
    /// Create options with explicit values.
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// A single prompt-in/text-out request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model to run.
    pub model: String,
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Sampling options.
    #[serde(default)]
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Create a request for the given model and prompt.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: GenerateOptions::default(),
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling options.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

/// Text produced by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub text: String,
    /// Tokens consumed, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

impl Generation {
    /// Create a generation without usage information.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: None,
        }
    }

    /// Attach token usage.
    pub fn with_tokens(mut self, tokens: u32) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// A prompt-in/text-out inference service.
///
/// Implementations must be cancel-safe: the orchestrator bounds every call
/// with a timeout and drops the future when the call loses the race.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Run one generation.
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError>;

    /// Get a human-readable name for this backend.
    fn name(&self) -> &str;

    /// Check if the backend is ready to accept requests.
    ///
    /// Default implementation always returns true.
    async fn is_ready(&self) -> bool {
        true
    }
}
