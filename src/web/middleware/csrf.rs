//! CSRF enforcement for state-changing requests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::session::session_id;
use crate::auth::CSRF_HEADER;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::QuillError;

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Require a valid single-use token in `X-CSRF-Token` on POST, PUT, PATCH
/// and DELETE. The token must be bound to the caller's session cookie.
pub async fn require_csrf(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !is_state_changing(req.method()) {
        return next.run(req).await;
    }

    let session = session_id(req.headers(), &state.web);
    let token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = match (session, token) {
        (Some(session), Some(token)) => state.csrf.validate(&session, &token).await,
        _ => Err(QuillError::CsrfRejected),
    };

    match result {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::warn!(method = %req.method(), path = %req.uri().path(), "CSRF check failed");
            ApiError::from(e).into_response()
        }
    }
}
