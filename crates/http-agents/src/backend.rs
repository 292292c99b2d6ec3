//! Chat-completions LLM backend.

use agent_core::{async_trait, BackendError, GenerateRequest, Generation, LlmBackend};
use reqwest::Client;
use tracing::{debug, info};

use crate::api_types::{
    ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
};
use crate::config::HttpAgentsConfig;

/// An [`LlmBackend`] speaking the OpenAI-compatible chat-completions API.
///
/// Works against Ollama, vLLM, llama.cpp server and hosted providers.
/// Requests are not retried; per-call deadlines are enforced by the caller
/// dropping the future, which aborts the HTTP request.
pub struct ChatCompletionsBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ChatCompletionsBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: &HttpAgentsConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!("ChatCompletionsBackend initialized with url: {}", config.llm_url);

        Ok(Self {
            client,
            url: format!("{}/v1/chat/completions", config.llm_url),
            api_key: config.llm_api_key.clone(),
        })
    }

    /// Create a backend from environment variables.
    ///
    /// See [`HttpAgentsConfig::from_env`] for the variables read.
    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(&HttpAgentsConfig::from_env()?)
    }

    /// The full endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Build the wire request for a generation request.
pub(crate) fn build_request(request: GenerateRequest) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(request.prompt));

    ChatCompletionRequest {
        model: request.model,
        messages,
        max_tokens: Some(request.options.max_tokens),
        temperature: Some(request.options.temperature),
        stream: false,
    }
}

/// Extract the generated text from a completion.
pub(crate) fn into_generation(
    completion: ChatCompletionResponse,
) -> Result<Generation, BackendError> {
    let tokens = completion.usage.as_ref().map(|usage| usage.total_tokens);
    let text = completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| BackendError::InvalidResponse("no content in completion".to_string()))?;

    let generation = Generation::new(text);
    Ok(match tokens {
        Some(tokens) => generation.with_tokens(tokens),
        None => generation,
    })
}

/// Turn a non-success body into a status error, preferring the API's message.
pub(crate) fn status_error(code: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|api_error| api_error.error.message)
        .unwrap_or_else(|_| body.to_string());
    BackendError::Status { code, message }
}

pub(crate) fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Unavailable(format!("Failed to send request: {}", e))
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionsBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        let body = build_request(request);
        debug!(model = %body.model, "Sending chat completion request");

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(usage) = &completion.usage {
            debug!(
                "Token usage - prompt: {}, completion: {}, total: {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }

        into_generation(completion)
    }

    fn name(&self) -> &str {
        "ChatCompletionsBackend"
    }
}
