//! Delayed wrappers - add artificial latency to another double.

use std::time::Duration;

use agent_core::{
    async_trait, AgentInvoker, BackendError, GenerateRequest, Generation, Invocation, LlmBackend,
    ReleaseHook, ReleaseReason,
};
use tokio::time::sleep;

/// An invoker that wraps another invoker and adds artificial delay.
///
/// Useful for testing per-invocation timeouts and the session deadline.
/// The delay counts against the invocation timeout.
pub struct DelayedInvoker<I: AgentInvoker> {
    inner: I,
    delay: Duration,
}

impl<I: AgentInvoker> DelayedInvoker<I> {
    /// Create a new DelayedInvoker wrapping the given invoker.
    pub fn new(inner: I, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create an invoker with a delay in milliseconds.
    pub fn with_millis(inner: I, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }
}

#[async_trait]
impl<I: AgentInvoker> AgentInvoker for DelayedInvoker<I> {
    async fn invoke(&self, agent_id: &str, input: &str, timeout: Duration) -> Invocation {
        if self.delay >= timeout {
            sleep(timeout).await;
            return Invocation::timed_out(timeout);
        }
        sleep(self.delay).await;
        self.inner.invoke(agent_id, input, timeout - self.delay).await
    }
}

/// A backend that wraps another backend and adds artificial delay.
pub struct DelayedBackend<B: LlmBackend> {
    inner: B,
    delay: Duration,
}

impl<B: LlmBackend> DelayedBackend<B> {
    /// Create a new DelayedBackend wrapping the given backend.
    pub fn new(inner: B, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a backend with a delay in seconds.
    pub fn with_secs(inner: B, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }
}

#[async_trait]
impl<B: LlmBackend> LlmBackend for DelayedBackend<B> {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, BackendError> {
        sleep(self.delay).await;
        self.inner.generate(request).await
    }

    fn name(&self) -> &str {
        "DelayedBackend"
    }

    async fn is_ready(&self) -> bool {
        self.inner.is_ready().await
    }
}

/// A release hook that wraps another hook and adds artificial delay.
///
/// The inner hook only sees the request once the delay has elapsed.
pub struct DelayedRelease<R: ReleaseHook> {
    inner: R,
    delay: Duration,
}

impl<R: ReleaseHook> DelayedRelease<R> {
    pub fn new(inner: R, delay: Duration) -> Self {
        Self { inner, delay }
    }

    /// Create a hook with a delay in seconds.
    pub fn with_secs(inner: R, secs: u64) -> Self {
        Self::new(inner, Duration::from_secs(secs))
    }
}

#[async_trait]
impl<R: ReleaseHook> ReleaseHook for DelayedRelease<R> {
    async fn release(&self, reason: ReleaseReason) {
        sleep(self.delay).await;
        self.inner.release(reason).await
    }
}
