//! API handlers and the state they share.

pub mod admin;
pub mod auth;
pub mod categories;
pub mod posts;

pub use admin::*;
pub use auth::*;
pub use categories::*;
pub use posts::*;

use std::sync::Arc;

use crate::auth::{AuthService, Clock, CsrfGuard, OsRandom, RandomSource, SystemClock};
use crate::blog::BlogService;
use crate::config::{Config, WebConfig};
use crate::web::middleware::SecurityHeaders;
use crate::{Database, Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub blog: BlogService,
    pub csrf: CsrfGuard,
    pub security: SecurityHeaders,
    pub web: WebConfig,
}

impl AppState {
    /// Create the state with the system clock and OS randomness.
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        Self::with_services(db, config, Arc::new(SystemClock), Arc::new(OsRandom))
    }

    /// Create the state with explicit time and randomness sources.
    pub fn with_services(
        db: Database,
        config: &Config,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        let auth = AuthService::new(db.clone(), clock.clone(), rng.clone(), config)?;
        let blog = BlogService::new(db.clone(), clock.clone(), auth.limiter().clone());
        let csrf = CsrfGuard::new(db.clone(), clock, rng, config.csrf.token_ttl_secs);
        let security = SecurityHeaders::from_config(&config.web)?;

        Ok(Self {
            db,
            auth,
            blog,
            csrf,
            security,
            web: config.web.clone(),
        })
    }
}
