//! HTTP interface for Quill.
//!
//! A JSON API under `/api` with cookie sessions, single-use CSRF tokens on
//! state-changing requests and security headers on every response.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
