//! Authentication and authorization for Quill.
//!
//! Password hashing, credential validation, sessions, CSRF tokens, rate
//! limiting and role checks.

mod clock;
mod csrf;
mod password;
pub mod permission;
mod rate_limit;
mod service;
pub mod validation;

pub use clock::{hash_token, Clock, ManualClock, OsRandom, RandomSource, SystemClock, TOKEN_BYTES};
pub use csrf::{CsrfGuard, CSRF_HEADER};
pub use password::{PasswordError, PasswordHasher};
pub use permission::{can, has_role, require, require_role, Capability};
pub use rate_limit::{Action, RateLimiter};
pub use service::{
    AuthService, AuthenticatedSession, ClientInfo, LoginOutcome, RegistrationRequest,
    SessionLookup,
};
pub use validation::{CredentialValidator, PasswordPolicy, Rule, Violation};
