//! Error types for collaborator operations.

use thiserror::Error;

/// Errors returned by an [`LlmBackend`](crate::LlmBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached (network failure, refused connection).
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a non-success status.
    #[error("backend error ({code}): {message}")]
    Status {
        /// HTTP-style status code.
        code: u16,
        /// Error body or message returned by the backend.
        message: String,
    },

    /// The backend answered but the body could not be decoded.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    /// The call did not finish within its timeout.
    #[error("backend call timed out")]
    Timeout,

    /// The call was cancelled before it finished.
    #[error("backend call cancelled")]
    Cancelled,

    /// The backend is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Whether this error means the backend could not be used at all,
    /// as opposed to answering with an error.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout | Self::Cancelled | Self::Configuration(_)
        )
    }
}

/// Errors returned by an [`AgentCatalog`](crate::AgentCatalog).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be reached.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The catalog answered with something that is not an agent list.
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}
