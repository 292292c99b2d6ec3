//! In-memory session state.
//!
//! [`SessionStore`] owns every session. Pipeline tasks and the memory guard
//! share it through an `Arc`; each removal cancels the session's token so
//! whatever is still running for it stops.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::model::{ExecutionPlan, ExecutionStep, StageResults};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// One query's journey through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: SessionId,
    pub query: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    started: Instant,
    pub status: SessionStatus,
    pub stage_results: StageResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Session {
    fn new(query: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            query: query.into(),
            created_at: Utc::now(),
            started: Instant::now(),
            status: SessionStatus::Active,
            stage_results: StageResults::default(),
            error: None,
        }
    }

    /// Time since creation, on the monotonic clock.
    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

struct Entry {
    session: Session,
    token: CancellationToken,
}

/// Concurrency-safe owner of all sessions.
///
/// Insertion order is creation order, so the front of the map holds the
/// oldest sessions. Lock sections never await.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<IndexMap<SessionId, Entry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new active session for `query`.
    pub async fn create(&self, query: impl Into<String>) -> Session {
        let session = Session::new(query);
        let entry = Entry {
            session: session.clone(),
            token: CancellationToken::new(),
        };
        self.sessions.write().await.insert(session.id.clone(), entry);
        debug!(session_id = %session.id, "SESSION_CREATED");
        session
    }

    /// Snapshot of a session.
    pub async fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().await.get(id).map(|e| e.session.clone())
    }

    /// Apply `f` to a session in place.
    pub async fn update<R>(&self, id: &SessionId, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(id).map(|e| f(&mut e.session))
    }

    /// Remove a session, cancelling anything still running for it.
    pub async fn remove(&self, id: &SessionId) -> Option<Session> {
        let entry = self.sessions.write().await.shift_remove(id)?;
        entry.token.cancel();
        debug!(session_id = %id, "SESSION_REMOVED");
        Some(entry.session)
    }

    /// Sessions still being processed, oldest first.
    pub async fn list_active(&self) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|e| !e.session.is_terminal())
            .map(|e| e.session.clone())
            .collect()
    }

    /// Token cancelled when the session is removed.
    pub async fn cancel_token(&self, id: &SessionId) -> Option<CancellationToken> {
        self.sessions.read().await.get(id).map(|e| e.token.clone())
    }

    /// Store the session's plan. A session gets at most one plan.
    pub async fn set_plan(&self, id: &SessionId, plan: ExecutionPlan) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::NotFound(id.clone()))?;

        if entry.session.stage_results.plan.is_some() {
            return Err(OrchestratorError::Internal(format!(
                "session {} already has a plan",
                id
            )));
        }
        entry.session.stage_results.plan = Some(plan);
        Ok(())
    }

    /// Append a step. Returns false when the session is gone.
    pub async fn append_step(&self, id: &SessionId, step: ExecutionStep) -> bool {
        self.update(id, |session| session.stage_results.steps.push(step))
            .await
            .is_some()
    }

    /// Move an active session to `status`.
    ///
    /// Returns false when the session is gone, already terminal, or `status`
    /// is `Active`.
    pub async fn transition(&self, id: &SessionId, status: SessionStatus) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        apply_transition(&mut entry.session, status)
    }

    /// Record the final response and move the session to `status` in one step.
    pub async fn finalize(&self, id: &SessionId, response: String, status: SessionStatus) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        if entry.session.is_terminal() {
            warn!(session_id = %id, status = ?entry.session.status, "SESSION_ALREADY_TERMINAL");
            return false;
        }
        entry.session.stage_results.final_response = Some(response);
        apply_transition(&mut entry.session, status)
    }

    /// Remove every session older than `ttl`, returning their ids.
    pub async fn remove_expired(&self, ttl: Duration) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();
        sessions.retain(|id, entry| {
            if entry.session.age() > ttl {
                entry.token.cancel();
                expired.push(id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Remove up to `n` of the oldest active sessions, returning their ids.
    pub async fn evict_oldest_active(&self, n: usize) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().await;
        let victims: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, e)| !e.session.is_terminal())
            .take(n)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &victims {
            if let Some(entry) = sessions.shift_remove(id) {
                entry.token.cancel();
            }
        }
        victims
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn apply_transition(session: &mut Session, status: SessionStatus) -> bool {
    if session.is_terminal() || status == SessionStatus::Active {
        warn!(
            session_id = %session.id,
            from = ?session.status,
            to = ?status,
            "SESSION_TRANSITION_REJECTED"
        );
        return false;
    }
    debug!(session_id = %session.id, to = ?status, "SESSION_TRANSITION");
    session.status = status;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Strategy;
    use tokio::time::advance;

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            strategy: Strategy::OrchestratorOnly,
            ordered_tasks: vec![],
            rationale: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = SessionStore::new();
        let session = store.create("hello").await;

        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.query, "hello");
        assert_eq!(fetched.status, SessionStatus::Active);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&SessionId::from("missing")).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_cancels_token() {
        let store = SessionStore::new();
        let session = store.create("q").await;
        let token = store.cancel_token(&session.id).await.unwrap();

        assert!(store.remove(&session.id).await.is_some());
        assert!(token.is_cancelled());
        assert!(store.is_empty().await);
        assert!(store.remove(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn test_second_plan_rejected() {
        let store = SessionStore::new();
        let session = store.create("q").await;

        store.set_plan(&session.id, plan()).await.unwrap();
        let err = store.set_plan(&session.id, plan()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Internal(_)));

        let err = store.set_plan(&SessionId::from("nope"), plan()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let store = SessionStore::new();
        let session = store.create("q").await;

        assert!(store.finalize(&session.id, "done".into(), SessionStatus::Completed).await);
        assert!(!store.transition(&session.id, SessionStatus::Failed).await);
        assert!(!store.finalize(&session.id, "again".into(), SessionStatus::Completed).await);

        let fetched = store.get(&session.id).await.unwrap();
        assert_eq!(fetched.status, SessionStatus::Completed);
        assert_eq!(fetched.stage_results.final_response.as_deref(), Some("done"));
        assert!(store.list_active().await.is_empty());
    }

    #[tokio::test]
    async fn test_cannot_transition_to_active() {
        let store = SessionStore::new();
        let session = store.create("q").await;
        assert!(!store.transition(&session.id, SessionStatus::Active).await);
    }

    #[tokio::test]
    async fn test_append_step() {
        let store = SessionStore::new();
        let session = store.create("q").await;

        assert!(store.append_step(&session.id, ExecutionStep::advisory("a")).await);
        assert!(store.append_step(&session.id, ExecutionStep::advisory("b")).await);
        assert!(!store.append_step(&SessionId::from("x"), ExecutionStep::advisory("c")).await);

        let steps = store.get(&session.id).await.unwrap().stage_results.steps;
        let texts: Vec<&str> = steps.iter().map(|s| s.output_text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_expired() {
        let store = SessionStore::new();
        let old = store.create("old").await;
        let old_token = store.cancel_token(&old.id).await.unwrap();
        advance(Duration::from_secs(200)).await;
        let young = store.create("young").await;
        advance(Duration::from_secs(101)).await;

        let expired = store.remove_expired(Duration::from_secs(300)).await;

        assert_eq!(expired, vec![old.id.clone()]);
        assert!(old_token.is_cancelled());
        assert!(store.get(&old.id).await.is_none());
        assert!(store.get(&young.id).await.is_some());
    }

    #[tokio::test]
    async fn test_evict_oldest_active_skips_terminal() {
        let store = SessionStore::new();
        let first = store.create("1").await;
        let second = store.create("2").await;
        let third = store.create("3").await;
        let fourth = store.create("4").await;
        store.transition(&first.id, SessionStatus::Completed).await;

        let evicted = store.evict_oldest_active(2).await;

        assert_eq!(evicted, vec![second.id.clone(), third.id.clone()]);
        assert!(store.get(&first.id).await.is_some());
        assert!(store.get(&fourth.id).await.is_some());
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new();
        assert_eq!(id.to_string().len(), 36);
        assert_eq!(SessionId::from("abc").as_str(), "abc");
    }

    #[tokio::test]
    async fn test_session_serializes_without_instant() {
        let store = SessionStore::new();
        let session = store.create("q").await;
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(json["status"], "active");
        assert_eq!(json["query"], "q");
        assert!(json.get("started").is_none());
        assert!(json.get("error").is_none());
    }
}
