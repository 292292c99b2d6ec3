//! Agent invocation support.
//!
//! An [`AgentInvoker`] runs one agent with a text task and reports the
//! outcome as an [`Invocation`]. Invokers never fail: transport errors and
//! timeouts are folded into an unsuccessful invocation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of invoking an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Text produced by the agent (empty on failure).
    pub output_text: String,
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Invocation {
    /// Create a successful invocation.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output_text: output.into(),
            success: true,
            error: None,
        }
    }

    /// Create a failed invocation.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output_text: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Create the failure reported when an invocation exceeds its timeout.
    pub fn timed_out(timeout: Duration) -> Self {
        Self::failure(format!("agent timed out after {}ms", timeout.as_millis()))
    }
}

/// Runs agents by id.
///
/// # Example
///
/// ```ignore
/// use agent_core::{AgentInvoker, Invocation};
///
/// struct Shouting;
///
/// #[async_trait]
/// impl AgentInvoker for Shouting {
///     async fn invoke(&self, agent_id: &str, input: &str, _timeout: Duration) -> Invocation {
///         Invocation::success(format!("{}: {}", agent_id, input.to_uppercase()))
///     }
/// }
/// ```
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke `agent_id` with `input`.
    ///
    /// Must return within `timeout`; a call that cannot complete in time
    /// should return [`Invocation::timed_out`].
    async fn invoke(&self, agent_id: &str, input: &str, timeout: Duration) -> Invocation;
}
