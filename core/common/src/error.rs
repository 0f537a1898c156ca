//! Common error types for credkeep.

use thiserror::Error;

/// Top-level error type for account operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Account (or the requested identity/backend pair) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller lacks authority for the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Backend type is not registered.
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Account configuration rejected by the backend schema.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Another account already uses this login on the same backend.
    #[error("Duplicate login: {0}")]
    DuplicateLogin(String),

    /// Persistence layer malfunction.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Backend status check failed.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
