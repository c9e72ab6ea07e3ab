//! Quill - a session-authenticated blog service.
//!
//! Accounts, server-side cookie sessions, single-use CSRF tokens, login
//! lockout and rate limiting sit under a small blog (posts, categories,
//! comments) served as a JSON API.

pub mod auth;
pub mod blog;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{AuthService, ClientInfo, CsrfGuard, RateLimiter, RegistrationRequest};
pub use blog::BlogService;
pub use config::Config;
pub use db::{AccountStatus, Database, Role, User};
pub use error::{QuillError, Result};
