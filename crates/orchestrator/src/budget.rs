//! Per-session time budget and cancellation.

use std::future::Future;
use std::time::Duration;

use agent_core::{ReleaseHook, ReleaseReason};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Outcome of a call raced against its budget.
#[derive(Debug)]
pub enum Bounded<T> {
    /// The call finished in time.
    Done(T),
    /// The per-call timeout elapsed first.
    TimedOut,
    /// The session deadline elapsed first.
    DeadlineExceeded,
    /// The session was cancelled or evicted.
    Cancelled,
}

impl<T> Bounded<T> {
    /// The output, if the call finished.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            _ => None,
        }
    }

    /// True when the session itself ran out, not just this call.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done(_) => "done",
            Self::TimedOut => "timed_out",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Deadline plus cancellation token shared by every call in a session.
///
/// Every LLM and agent call is awaited through [`Budget::bound`]; the losing
/// branch of the race is dropped, which cancels the underlying request.
#[derive(Debug, Clone)]
pub struct Budget {
    deadline: Instant,
    token: CancellationToken,
}

impl Budget {
    pub fn new(deadline: Instant, token: CancellationToken) -> Self {
        Self { deadline, token }
    }

    /// A budget ending `timeout` from now, with a fresh token.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    /// A budget that never runs out in practice. Useful in tests.
    pub fn unbounded() -> Self {
        Self::from_timeout(Duration::from_secs(365 * 24 * 60 * 60))
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the deadline has passed or the session was cancelled.
    pub fn is_exhausted(&self) -> bool {
        self.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Race `fut` against `limit`, the session deadline and cancellation.
    pub async fn bound<F: Future>(&self, limit: Duration, fut: F) -> Bounded<F::Output> {
        if self.token.is_cancelled() {
            return Bounded::Cancelled;
        }
        let now = Instant::now();
        if now >= self.deadline {
            return Bounded::DeadlineExceeded;
        }

        let call_deadline = now + limit;
        let call_is_tighter = call_deadline < self.deadline;
        let wake_at = if call_is_tighter { call_deadline } else { self.deadline };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Bounded::Cancelled,
            out = fut => Bounded::Done(out),
            _ = sleep_until(wake_at) => {
                if call_is_tighter {
                    Bounded::TimedOut
                } else {
                    Bounded::DeadlineExceeded
                }
            }
        }
    }

    /// Run a release hook without letting it outlive the session.
    ///
    /// The hook gets at most `limit` and whatever remains of the session.
    /// Once the session has run out no release is issued.
    pub async fn release(&self, hook: &dyn ReleaseHook, reason: ReleaseReason, limit: Duration) {
        let outcome = self.bound(limit, hook.release(reason)).await;
        if !matches!(outcome, Bounded::Done(())) {
            warn!(?reason, outcome = outcome.label(), "RELEASE_CUT_SHORT");
        }
    }
}
