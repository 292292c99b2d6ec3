//! Error types for orchestrator operations.

use agent_core::CatalogError;
use thiserror::Error;

use crate::session::SessionId;

/// Failure to extract a structured record from model output.
///
/// Always recovered inside the stage that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The response contained nothing resembling JSON.
    #[error("no JSON found in response")]
    NoJson,

    /// JSON was found but could not be decoded, even after repairs.
    #[error("invalid JSON: {0}")]
    Json(String),

    /// A required field was missing from the response.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The response was empty.
    #[error("empty response")]
    Empty,
}

/// Errors that can occur during orchestration.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// A required collaborator could not be reached.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// An agent invocation failed.
    #[error("agent {agent_id} failed: {message}")]
    AgentExecution { agent_id: String, message: String },

    /// The session ran past its overall deadline.
    #[error("session {0} timed out")]
    SessionTimeout(SessionId),

    /// The session was evicted under memory pressure.
    #[error("session {0} evicted under memory pressure")]
    ResourceEviction(SessionId),

    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// Invariant violation or pipeline task failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CatalogError> for OrchestratorError {
    fn from(e: CatalogError) -> Self {
        Self::BackendUnavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_maps_to_backend_unavailable() {
        let err: OrchestratorError = CatalogError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, OrchestratorError::BackendUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_messages() {
        let id = SessionId::from("abc");
        assert_eq!(
            OrchestratorError::NotFound(id.clone()).to_string(),
            "session abc not found"
        );
        assert_eq!(ParseError::MissingField("domain").to_string(), "missing field: domain");
    }
}
