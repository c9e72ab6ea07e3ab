//! Middleware and request extractors for the Web API.

pub mod cors;
pub mod csrf;
pub mod security;
pub mod session;

pub use cors::create_cors_layer;
pub use csrf::require_csrf;
pub use security::{security_headers, SecurityHeaders};
pub use session::{
    clear_expired_session, removal_cookie, session_cookie, session_id, CurrentUser, MaybeUser,
    SessionCookie,
};
