//! Scripted agent invoker - per-agent replies, failures and delays.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_core::{async_trait, AgentInvoker, Invocation};
use tokio::time::sleep;

#[derive(Debug, Clone)]
enum Behavior {
    Reply(String),
    Fail(String),
    Slow(Duration, String),
}

/// One recorded call to [`ScriptedInvoker`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    /// Agent that was invoked.
    pub agent_id: String,
    /// Input text the agent received.
    pub input: String,
}

/// An invoker with a scripted behavior per agent.
///
/// Agents without a script fail with "unknown agent". Every call is recorded
/// before it starts, so calls that are later cancelled still show up.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInvoker {
    behaviors: HashMap<String, Behavior>,
    calls: Arc<Mutex<Vec<InvocationRecord>>>,
}

impl ScriptedInvoker {
    /// Create an invoker with no scripted agents.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `agent_id` reply with `output`.
    pub fn reply(mut self, agent_id: impl Into<String>, output: impl Into<String>) -> Self {
        self.behaviors
            .insert(agent_id.into(), Behavior::Reply(output.into()));
        self
    }

    /// Make `agent_id` fail with `error`.
    pub fn fail(mut self, agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        self.behaviors
            .insert(agent_id.into(), Behavior::Fail(error.into()));
        self
    }

    /// Make `agent_id` take `delay` before replying with `output`.
    ///
    /// If `delay` exceeds the invocation timeout, the call reports a timeout
    /// once the timeout elapses.
    pub fn slow(
        mut self,
        agent_id: impl Into<String>,
        delay: Duration,
        output: impl Into<String>,
    ) -> Self {
        self.behaviors
            .insert(agent_id.into(), Behavior::Slow(delay, output.into()));
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<InvocationRecord> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Input passed to the first call of `agent_id`, if it was called.
    pub fn input_for(&self, agent_id: &str) -> Option<String> {
        self.calls()
            .into_iter()
            .find(|record| record.agent_id == agent_id)
            .map(|record| record.input)
    }
}

#[async_trait]
impl AgentInvoker for ScriptedInvoker {
    async fn invoke(&self, agent_id: &str, input: &str, timeout: Duration) -> Invocation {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(InvocationRecord {
                agent_id: agent_id.to_string(),
                input: input.to_string(),
            });
        }

        match self.behaviors.get(agent_id) {
            Some(Behavior::Reply(output)) => Invocation::success(output.clone()),
            Some(Behavior::Fail(error)) => Invocation::failure(error.clone()),
            Some(Behavior::Slow(delay, output)) => {
                if *delay > timeout {
                    sleep(timeout).await;
                    Invocation::timed_out(timeout)
                } else {
                    sleep(*delay).await;
                    Invocation::success(output.clone())
                }
            }
            None => Invocation::failure(format!("unknown agent: {}", agent_id)),
        }
    }
}
