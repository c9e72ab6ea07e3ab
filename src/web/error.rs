//! API error handling for the Quill HTTP interface.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::QuillError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request (400).
    BadRequest,
    /// Field-level validation error (422).
    ValidationError,
    /// Username, email or name already taken (409).
    Conflict,
    /// Login failed (401).
    InvalidCredentials,
    /// Account locked (423).
    AccountLocked,
    /// Too many requests (429).
    RateLimited,
    /// Session missing or expired (401).
    SessionExpired,
    /// CSRF token rejected (403).
    CsrfRejected,
    /// Not found (404).
    NotFound,
    /// Role insufficient (403).
    Forbidden,
    /// Internal server error (500).
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::InvalidCredentials | ErrorCode::SessionExpired => StatusCode::UNAUTHORIZED,
            ErrorCode::AccountLocked => StatusCode::LOCKED,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::CsrfRejected | ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field-level validation error details (only present for validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, Vec<String>>>,
}

/// Response extension asking the session layer to expire the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct ClearSessionCookie;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<BTreeMap<String, Vec<String>>>,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            retry_after_secs: None,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a validation error with field-level details.
    pub fn validation(details: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            details: Some(details),
            ..Self::new(ErrorCode::ValidationError, "Validation failed")
        }
    }

    /// Create a validation error from validator::ValidationErrors.
    pub fn from_validation_errors(errors: validator::ValidationErrors) -> Self {
        let mut details: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, field_errors) in errors.field_errors() {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value ({})", e.code))
                })
                .collect();
            details.insert(field.to_string(), messages);
        }

        Self::validation(details)
    }

    /// The machine-readable code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let code = self.code;
        let retry_after = self.retry_after_secs;
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        if code == ErrorCode::SessionExpired {
            response.extensions_mut().insert(ClearSessionCookie);
        }
        response
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<QuillError> for ApiError {
    fn from(err: QuillError) -> Self {
        match err {
            QuillError::ValidationFailed(violations) => {
                let mut details: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for v in violations {
                    details
                        .entry(v.field.to_string())
                        .or_default()
                        .push(format!("{}: {}", v.rule.code(), v.rule));
                }
                ApiError::validation(details)
            }
            QuillError::DuplicateIdentity => {
                ApiError::new(ErrorCode::Conflict, "Already exists")
            }
            QuillError::InvalidCredentials => {
                ApiError::new(ErrorCode::InvalidCredentials, "Invalid credentials")
            }
            QuillError::AccountLocked { retry_after_secs } => {
                ApiError::new(ErrorCode::AccountLocked, "Account is temporarily locked")
                    .with_retry_after(retry_after_secs)
            }
            QuillError::RateLimited { retry_after_secs } => {
                ApiError::new(ErrorCode::RateLimited, "Too many requests")
                    .with_retry_after(retry_after_secs)
            }
            QuillError::SessionExpired => {
                ApiError::new(ErrorCode::SessionExpired, "Authentication required")
            }
            QuillError::CsrfRejected => {
                ApiError::new(ErrorCode::CsrfRejected, "Invalid or missing CSRF token")
            }
            QuillError::NotFound(what) => {
                ApiError::new(ErrorCode::NotFound, format!("{what} not found"))
            }
            QuillError::Forbidden => ApiError::new(ErrorCode::Forbidden, "Permission denied"),
            err @ (QuillError::StorageFailure(_)
            | QuillError::Crypto(_)
            | QuillError::Io(_)
            | QuillError::Config(_)) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}
