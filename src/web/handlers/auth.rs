//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::auth::{ClientInfo, RegistrationRequest};
use crate::web::dto::{
    ApiResponse, ChangePasswordRequest, CsrfTokenResponse, LoginRequest, RegisterRequest,
    UserResponse,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::{session_cookie, CurrentUser, SessionCookie};

/// GET /api/csrf-token - Issue a single-use CSRF token.
///
/// Clients without a session cookie receive an anonymous identifier the
/// token is bound to.
pub async fn csrf_token(
    State(state): State<Arc<AppState>>,
    SessionCookie(session): SessionCookie,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<CsrfTokenResponse>>), ApiError> {
    let (jar, session) = match session {
        Some(id) => (jar, id),
        None => {
            let id = state.auth.new_session_id();
            (jar.add(session_cookie(&state.web, id.clone())), id)
        }
    };

    let token = state.csrf.issue(&session).await?;
    Ok((jar, Json(ApiResponse::new(CsrfTokenResponse { token }))))
}

/// POST /api/register - Create an account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state
        .auth
        .register(
            &RegistrationRequest::new(req.username, req.email, req.password),
            &client,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(UserResponse::from(user))),
    ))
}

/// POST /api/login - Log in and receive a fresh session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    SessionCookie(previous): SessionCookie,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<UserResponse>>), ApiError> {
    let outcome = state
        .auth
        .login(&req.identifier, &req.password, &client, previous.as_deref())
        .await?;

    // Tokens issued to the pre-login identifier die with it.
    if let Some(previous) = &previous {
        state.csrf.revoke_for_session(previous).await?;
    }

    let jar = jar.add(session_cookie(&state.web, outcome.session_id));
    Ok((jar, Json(ApiResponse::new(UserResponse::from(outcome.user)))))
}

/// POST /api/logout - End the current session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    client: ClientInfo,
    SessionCookie(session): SessionCookie,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let anonymous = state.auth.logout(session.as_deref(), &client).await?;
    if let Some(session) = &session {
        state.csrf.revoke_for_session(session).await?;
    }

    Ok((
        jar.add(session_cookie(&state.web, anonymous)),
        StatusCode::NO_CONTENT,
    ))
}

/// GET /api/me - The logged-in user.
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse::new(UserResponse::from(user)))
}

/// POST /api/password - Change the logged-in user's password.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    client: ClientInfo,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .auth
        .change_password(user.id, &req.current_password, &req.new_password, &client)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
