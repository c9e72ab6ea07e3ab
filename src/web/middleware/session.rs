//! Cookie session extractors.
//!
//! Handlers declare what they need: [`SessionCookie`] for the raw cookie,
//! [`ClientInfo`] for the caller's address, [`CurrentUser`] when a valid
//! session is required and [`MaybeUser`] when it is optional.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{header::USER_AGENT, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::{ClientInfo, SessionLookup};
use crate::config::WebConfig;
use crate::db::User;
use crate::web::error::{ApiError, ClearSessionCookie};
use crate::web::handlers::AppState;
use crate::QuillError;

/// Read the session identifier from the request cookies.
pub fn session_id(headers: &HeaderMap, config: &WebConfig) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(&config.session_cookie)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Build the session cookie carrying `value`.
pub fn session_cookie(config: &WebConfig, value: String) -> Cookie<'static> {
    let same_site = if config.same_site.eq_ignore_ascii_case("strict") {
        SameSite::Strict
    } else {
        SameSite::Lax
    };
    Cookie::build((config.session_cookie.clone(), value))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(same_site)
        .path("/")
        .build()
}

/// A cookie that makes the browser drop the session cookie.
pub fn removal_cookie(config: &WebConfig) -> Cookie<'static> {
    let mut cookie = session_cookie(config, String::new());
    cookie.make_removal();
    cookie
}

/// Client IP from the connection, or from proxy headers when trusted.
fn client_ip(parts: &Parts, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = parts
            .headers
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return ip.to_string();
        }

        if let Some(real_ip) = parts
            .headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
        {
            return real_ip.trim().to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// The raw session cookie value, if any.
#[derive(Debug, Clone)]
pub struct SessionCookie(pub Option<String>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(session_id(&parts.headers, &state.web)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let info = ClientInfo::new(client_ip(parts, state.web.trust_proxy_headers));
        Ok(
            match parts.headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
                Some(agent) => info.with_user_agent(agent),
                None => info,
            },
        )
    }
}

/// The user owning a valid session. Rejects with `SESSION_EXPIRED`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let id = session_id(&parts.headers, &state.web).ok_or(QuillError::SessionExpired)?;
        let session = state.auth.validate_session(&id).await?;
        Ok(Self(session.user))
    }
}

/// The session owner when there is one. Anonymous and expired sessions both
/// yield no user.
#[derive(Debug, Clone)]
pub struct MaybeUser {
    pub user: Option<User>,
    /// The presented cookie belonged to a session that has just expired.
    pub expired: bool,
}

impl MaybeUser {
    /// Response part that expires the cookie of an ended session.
    pub fn clear_cookie(&self) -> Option<Extension<ClearSessionCookie>> {
        self.expired.then_some(Extension(ClearSessionCookie))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(id) = session_id(&parts.headers, &state.web) else {
            return Ok(Self { user: None, expired: false });
        };
        Ok(match state.auth.lookup_session(&id).await? {
            SessionLookup::Active(session) => Self {
                user: Some(session.user),
                expired: false,
            },
            SessionLookup::Expired => Self {
                user: None,
                expired: true,
            },
            SessionLookup::Unknown => Self {
                user: None,
                expired: false,
            },
        })
    }
}

/// Expire the session cookie on responses flagged with [`ClearSessionCookie`].
pub async fn clear_expired_session(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if response.extensions().get::<ClearSessionCookie>().is_none() {
        return response;
    }
    let jar = CookieJar::new().add(removal_cookie(&state.web));
    (jar, response).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    #[test]
    fn test_session_id_from_cookie_header() {
        let config = WebConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark; quill_session=abc123".parse().unwrap());
        assert_eq!(session_id(&headers, &config).as_deref(), Some("abc123"));

        headers.insert(COOKIE, "quill_session=".parse().unwrap());
        assert_eq!(session_id(&headers, &config), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let config = WebConfig {
            same_site: "Strict".into(),
            ..WebConfig::default()
        };
        let rendered = session_cookie(&config, "abc".into()).to_string();
        assert!(rendered.starts_with("quill_session=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Path=/"));
    }

    #[test]
    fn test_removal_cookie_expires() {
        let rendered = removal_cookie(&WebConfig::default()).to_string();
        assert!(rendered.starts_with("quill_session=;"));
        assert!(rendered.contains("Max-Age=0"));
    }

    fn parts_with(headers: &[(&'static str, &'static str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_client_ip_ignores_proxy_headers_unless_trusted() {
        let parts = parts_with(&[("X-Forwarded-For", "203.0.113.9, 10.0.0.1")]);
        assert_eq!(client_ip(&parts, false), "unknown");
        assert_eq!(client_ip(&parts, true), "203.0.113.9");

        let parts = parts_with(&[("X-Real-IP", "198.51.100.4")]);
        assert_eq!(client_ip(&parts, true), "198.51.100.4");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut parts = parts_with(&[("X-Forwarded-For", "203.0.113.9")]);
        parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 5000))));
        assert_eq!(client_ip(&parts, false), "192.0.2.1");
    }
}
