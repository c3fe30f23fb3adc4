//! Error types for the matter store.

use thiserror::Error;

/// Coarse failure category surfaced to callers at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The identifier has no matching row.
    NotFound,
    /// Malformed or contradictory input.
    BadRequest,
    /// Ownership or share-code mismatch.
    Unauthorized,
    /// Underlying store failure other than not-found.
    StoreFailure,
}

/// Common error type for the matter store.
#[derive(Error, Debug)]
pub enum MatterError {
    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed or contradictory request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The operator does not own the resource or presented a wrong code.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MatterError {
    /// Map the error onto its request-boundary category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatterError::NotFound(_) => ErrorKind::NotFound,
            MatterError::BadRequest(_) => ErrorKind::BadRequest,
            MatterError::Unauthorized(_) => ErrorKind::Unauthorized,
            MatterError::Database(_) | MatterError::Io(_) | MatterError::Config(_) => {
                ErrorKind::StoreFailure
            }
        }
    }
}

impl From<sqlx::Error> for MatterError {
    fn from(e: sqlx::Error) -> Self {
        MatterError::Database(e.to_string())
    }
}

/// Result type alias for matter store operations.
pub type Result<T> = std::result::Result<T, MatterError>;
