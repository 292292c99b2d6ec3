//! Echo invoker - echoes the task back.

use std::time::Duration;

use agent_core::{async_trait, AgentInvoker, Invocation};

/// An invoker that echoes its input back, tagged with the agent id.
///
/// Useful for testing context hand-off without any agent logic.
#[derive(Debug, Clone, Default)]
pub struct EchoInvoker {
    /// Optional prefix to add before the echo.
    prefix: Option<String>,
}

impl EchoInvoker {
    /// Create a new EchoInvoker with no prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new EchoInvoker with a custom prefix.
    ///
    /// # Example
    ///
    /// ```rust
    /// use mock_agents::EchoInvoker;
    ///
    /// let invoker = EchoInvoker::with_prefix("Echo: ");
    /// // Will respond with "Echo: [agent-id] <input>"
    /// ```
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl AgentInvoker for EchoInvoker {
    async fn invoke(&self, agent_id: &str, input: &str, _timeout: Duration) -> Invocation {
        let output = match &self.prefix {
            Some(prefix) => format!("{}[{}] {}", prefix, agent_id, input),
            None => format!("[{}] {}", agent_id, input),
        };
        Invocation::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_no_prefix() {
        let result = EchoInvoker::new()
            .invoke("legal", "Hello!", Duration::from_secs(1))
            .await;
        assert_eq!(result.output_text, "[legal] Hello!");
    }

    #[tokio::test]
    async fn test_echo_with_prefix() {
        let result = EchoInvoker::with_prefix("Echo: ")
            .invoke("legal", "Hello!", Duration::from_secs(1))
            .await;
        assert_eq!(result.output_text, "Echo: [legal] Hello!");
    }
}
