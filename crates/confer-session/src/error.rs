//! Error types for the session layer.

use confer_core::error::ConferError;
use confer_core::types::MigrationReport;

/// Errors from the session manager and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("auth state is still resolving")]
    NotReady,
    #[error("no authenticated user")]
    NotAuthenticated,
    #[error("daily interaction limit reached")]
    QuotaExceeded,
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error(
        "migration stopped after {} of {} sessions",
        .0.migrated,
        .0.migrated + .0.remaining
    )]
    MigrationIncomplete(MigrationReport),
    #[error("store error: {0}")]
    Store(String),
    #[error("assistant error: {0}")]
    Assistant(String),
}

impl From<ConferError> for SessionError {
    fn from(err: ConferError) -> Self {
        SessionError::Store(err.to_string())
    }
}
