//! Security headers middleware.

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
        },
        HeaderValue, Request,
    },
    middleware::Next,
    response::Response,
};

use crate::config::WebConfig;
use crate::{QuillError, Result};

/// Header values applied to every response.
///
/// Built once from [`WebConfig`] so that a malformed value fails at startup
/// rather than per request.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp: HeaderValue,
    hsts: Option<HeaderValue>,
    referrer_policy: HeaderValue,
}

impl SecurityHeaders {
    /// Build the header set. An empty HSTS value disables the header.
    pub fn from_config(config: &WebConfig) -> Result<Self> {
        let parse = |name: &str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| QuillError::Config(format!("invalid web.{name}: {e}")))
        };
        let hsts = if config.hsts.trim().is_empty() {
            None
        } else {
            Some(parse("hsts", &config.hsts)?)
        };
        Ok(Self {
            csp: parse("content_security_policy", &config.content_security_policy)?,
            hsts,
            referrer_policy: parse("referrer_policy", &config.referrer_policy)?,
        })
    }
}

/// Security headers middleware.
///
/// Adds nosniff, `X-Frame-Options: DENY`, the configured CSP, HSTS and
/// Referrer-Policy, and `Cache-Control: no-store` when the handler set none.
pub async fn security_headers(
    State(security): State<SecurityHeaders>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(CONTENT_SECURITY_POLICY, security.csp.clone());
    headers.insert(REFERRER_POLICY, security.referrer_policy.clone());
    if let Some(hsts) = &security.hsts {
        headers.insert(STRICT_TRANSPORT_SECURITY, hsts.clone());
    }

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    response
}
