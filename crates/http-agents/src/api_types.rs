//! Wire types for the chat-completions API and the agent service.

use agent_core::AgentDescriptor;
use serde::{Deserialize, Serialize};

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Always false; streaming is not supported.
    pub stream: bool,
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    /// Response ID
    #[serde(default)]
    pub id: Option<String>,
    /// Model used
    #[serde(default)]
    pub model: Option<String>,
    /// Response choices
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// A response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    /// The message
    pub message: ResponseMessage,
    /// Finish reason
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response message.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Role
    #[serde(default)]
    pub role: Option<String>,
    /// Content (may be null)
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u32,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ApiErrorDetails,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetails {
    /// Error message
    pub message: String,
}

/// Catalog listing, either a bare array or wrapped in `{"agents": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CatalogPayload {
    List(Vec<AgentDescriptor>),
    Wrapped { agents: Vec<AgentDescriptor> },
}

impl CatalogPayload {
    pub fn into_agents(self) -> Vec<AgentDescriptor> {
        match self {
            Self::List(agents) | Self::Wrapped { agents } => agents,
        }
    }
}

/// Body of an agent invocation request.
#[derive(Debug, Clone, Serialize)]
pub struct InvokeRequest<'a> {
    pub input: &'a str,
}

/// Body of an agent invocation response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokeResponse {
    #[serde(default, alias = "output_text", alias = "outputText")]
    pub output: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of a model unload request.
#[derive(Debug, Clone, Serialize)]
pub struct UnloadRequest<'a> {
    pub model: &'a str,
    pub keep_alive: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_unset_options() {
        let request = ChatCompletionRequest {
            model: "qwen3:8b".to_string(),
            messages: vec![ChatMessage::user("hi")],
            max_tokens: None,
            temperature: Some(0.2),
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_minimal_completion_response() {
        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("hello"));
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_catalog_payload_shapes() {
        let bare = r#"[{"id":"legal","name":"Legal"}]"#;
        let wrapped = r#"{"agents":[{"id":"legal","name":"Legal","modelId":"m"}]}"#;

        let bare: CatalogPayload = serde_json::from_str(bare).unwrap();
        let wrapped: CatalogPayload = serde_json::from_str(wrapped).unwrap();

        assert_eq!(bare.into_agents()[0].id, "legal");
        assert_eq!(wrapped.into_agents()[0].model_id, "m");
    }

    #[test]
    fn test_invoke_response_aliases() {
        let camel: InvokeResponse = serde_json::from_str(r#"{"outputText":"a"}"#).unwrap();
        let snake: InvokeResponse = serde_json::from_str(r#"{"output_text":"b"}"#).unwrap();
        assert_eq!(camel.output.as_deref(), Some("a"));
        assert_eq!(snake.output.as_deref(), Some("b"));
    }

    #[test]
    fn test_unload_body() {
        let body = serde_json::to_value(UnloadRequest {
            model: "qwen3:8b",
            keep_alive: 0,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"model": "qwen3:8b", "keep_alive": 0}));
    }
}
