//! Domain errors for the redlining engine.

use thiserror::Error;

/// Domain-level errors that can occur while composing a draft.
///
/// Only `ContractNotFound` fails a request outright. Everything else is
/// either degraded around (package problems fall back to the in-memory
/// HTML patch) or surfaced as metadata on the response.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Structured package unavailable: {0}")]
    PackageUnavailable(String),

    #[error("Snapshot store error: {0}")]
    SnapshotStore(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// True when the error must fail the whole request.
    ///
    /// Everything except a missing contract degrades: the compose flow
    /// always answers with the best available artifact.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::ContractNotFound(_))
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
