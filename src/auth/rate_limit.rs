//! Sliding-window rate limiting for login, registration and content actions.
//!
//! State lives in the `rate_limit_events` table, so every worker and process
//! sharing the database sees the same windows.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::clock::Clock;
use crate::config::{RateLimitConfig, RateLimitRule};
use crate::datetime::{add_secs, from_db, sub_secs, to_db};
use crate::db::{Database, RateLimitRepository};
use crate::{QuillError, Result};

/// A rate-limited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Register,
    Comment,
    Post,
}

impl Action {
    /// All actions, for cleanup sweeps.
    pub const ALL: [Action; 4] = [Action::Login, Action::Register, Action::Comment, Action::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::Register => "register",
            Action::Comment => "comment",
            Action::Post => "post",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Database-backed sliding-window rate limiter.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> quill::Result<()> {
/// use std::sync::Arc;
/// use quill::auth::{Action, RateLimiter, SystemClock};
/// use quill::config::RateLimitConfig;
/// use quill::Database;
///
/// let db = Database::open_in_memory().await?;
/// let limiter = RateLimiter::new(db, Arc::new(SystemClock), RateLimitConfig::default());
/// limiter.check_and_record(Action::Login, "203.0.113.7").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RateLimiter {
    db: Database,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(db: Database, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self { db, clock, config }
    }

    /// The configured window for an action.
    pub fn rule(&self, action: Action) -> RateLimitRule {
        match action {
            Action::Login => self.config.login,
            Action::Register => self.config.register,
            Action::Comment => self.config.comment,
            Action::Post => self.config.post,
        }
    }

    /// Record one action for `identifier`, or fail with `RateLimited`.
    ///
    /// Old events are pruned first; the count and the insert then happen in
    /// one statement so concurrent callers cannot both slip under the ceiling.
    pub async fn check_and_record(&self, action: Action, identifier: &str) -> Result<()> {
        let rule = self.rule(action);
        let now = self.clock.now();
        let window_start = to_db(&sub_secs(now, rule.window_secs)?);
        let repo = RateLimitRepository::new(self.db.pool());

        repo.prune(action.as_str(), identifier, &window_start).await?;
        let recorded = repo
            .record_if_under(
                action.as_str(),
                identifier,
                &window_start,
                rule.max_actions,
                &to_db(&now),
            )
            .await?;

        if recorded {
            debug!(action = %action, "Rate limit event recorded");
            return Ok(());
        }

        let oldest = repo
            .oldest_in_window(action.as_str(), identifier, &window_start)
            .await?;
        let retry_after_secs = match oldest.as_deref().and_then(from_db) {
            Some(oldest) => {
                let remaining = add_secs(oldest, rule.window_secs)? - now;
                // round up to whole seconds
                let millis = remaining.num_milliseconds().max(0) as u64;
                millis.div_ceil(1000).max(1)
            }
            None => rule.window_secs,
        };

        warn!(action = %action, retry_after_secs, "Rate limit exceeded");
        Err(QuillError::RateLimited { retry_after_secs })
    }

    /// Forget every event for a key.
    pub async fn clear(&self, action: Action, identifier: &str) -> Result<()> {
        RateLimitRepository::new(self.db.pool())
            .clear(action.as_str(), identifier)
            .await?;
        Ok(())
    }

    /// Number of events currently inside the window for a key.
    pub async fn current_count(&self, action: Action, identifier: &str) -> Result<i64> {
        let window_start = to_db(&sub_secs(self.clock.now(), self.rule(action).window_secs)?);
        RateLimitRepository::new(self.db.pool())
            .count_in_window(action.as_str(), identifier, &window_start)
            .await
    }

    /// Delete events that have left their action's window.
    pub async fn cleanup(&self) -> Result<u64> {
        let now = self.clock.now();
        let repo = RateLimitRepository::new(self.db.pool());
        let mut removed = 0;
        for action in Action::ALL {
            let window_start = to_db(&sub_secs(now, self.rule(action).window_secs)?);
            removed += repo.cleanup(action.as_str(), &window_start).await?;
        }
        Ok(removed)
    }
}
