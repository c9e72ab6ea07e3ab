//! Error types for Quill.

use thiserror::Error;

use crate::auth::validation::Violation;

/// Common error type for Quill.
///
/// Every service call returns this type so that handlers can match on the
/// failure kind exhaustively. The HTTP layer turns it into a generic message
/// plus a machine-readable code (see `web::error`).
#[derive(Error, Debug)]
pub enum QuillError {
    /// User-correctable input problems, all reported at once.
    #[error("validation failed: {}", format_violations(.0))]
    ValidationFailed(Vec<Violation>),

    /// Username, email, or another unique name is already taken.
    #[error("identity already exists")]
    DuplicateIdentity,

    /// Login or password check failed.
    ///
    /// Deliberately uninformative: unknown user, wrong password, locked and
    /// inactive accounts all look the same to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Account is locked after repeated failures.
    #[error("account locked for {retry_after_secs} seconds")]
    AccountLocked {
        /// Seconds until the lockout lifts.
        retry_after_secs: u64,
    },

    /// Too many requests for this action and client.
    #[error("rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the oldest event leaves the window.
        retry_after_secs: u64,
    },

    /// Session is missing, idle too long, or its owner is gone.
    #[error("session expired")]
    SessionExpired,

    /// CSRF token missing, expired, foreign, or already consumed.
    #[error("CSRF token rejected")]
    CsrfRejected,

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Role insufficient for the requested action.
    #[error("forbidden")]
    Forbidden,

    /// Underlying data store failure.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// Password hashing machinery failed (not a wrong password).
    #[error("password hashing failure: {0}")]
    Crypto(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl QuillError {
    /// Build a single-violation validation error.
    pub fn invalid(field: &'static str, rule: crate::auth::validation::Rule) -> Self {
        QuillError::ValidationFailed(vec![Violation::new(field, rule)])
    }

    /// Whether the error is an internal failure that must not leak details.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            QuillError::StorageFailure(_)
                | QuillError::Crypto(_)
                | QuillError::Io(_)
                | QuillError::Config(_)
        )
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for QuillError {
    fn from(e: sqlx::Error) -> Self {
        QuillError::StorageFailure(e.to_string())
    }
}

/// Check whether a sqlx error is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Result type alias for Quill operations.
pub type Result<T> = std::result::Result<T, QuillError>;
