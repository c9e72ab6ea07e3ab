//! Single-use CSRF tokens bound to a session identifier.

use std::sync::Arc;

use tracing::{debug, warn};

use super::clock::{hash_token, Clock, RandomSource};
use crate::datetime::{add_secs, to_db};
use crate::db::{CsrfTokenRepository, Database, NewCsrfToken};
use crate::{QuillError, Result};

/// HTTP header carrying the token on state-changing requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Issues and validates CSRF tokens.
///
/// The database stores only hashes of the token and of the session id it is
/// bound to. A token validates at most once.
#[derive(Clone)]
pub struct CsrfGuard {
    db: Database,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    ttl_secs: u64,
}

impl CsrfGuard {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            clock,
            rng,
            ttl_secs,
        }
    }

    /// Issue a token bound to `session_id` (anonymous or authenticated).
    pub async fn issue(&self, session_id: &str) -> Result<String> {
        let token = self.rng.token();
        let now = self.clock.now();

        CsrfTokenRepository::new(self.db.pool())
            .create(
                &NewCsrfToken {
                    token_hash: hash_token(&token),
                    binding_hash: hash_token(session_id),
                    expires_at: to_db(&add_secs(now, self.ttl_secs)?),
                },
                &to_db(&now),
            )
            .await?;

        debug!("CSRF token issued");
        Ok(token)
    }

    /// Consume `token` for `session_id`.
    ///
    /// Fails with `CsrfRejected` if the token is empty, unknown, expired,
    /// bound to another session, or already used.
    pub async fn validate(&self, session_id: &str, token: &str) -> Result<()> {
        if token.is_empty() || session_id.is_empty() {
            return Err(QuillError::CsrfRejected);
        }

        let consumed = CsrfTokenRepository::new(self.db.pool())
            .consume(
                &hash_token(token),
                &hash_token(session_id),
                &to_db(&self.clock.now()),
            )
            .await?;

        if consumed {
            Ok(())
        } else {
            warn!("CSRF token rejected");
            Err(QuillError::CsrfRejected)
        }
    }

    /// Drop every outstanding token of a session (used when it ends).
    pub async fn revoke_for_session(&self, session_id: &str) -> Result<u64> {
        CsrfTokenRepository::new(self.db.pool())
            .delete_for_binding(&hash_token(session_id))
            .await
    }

    /// Purge expired and consumed tokens.
    pub async fn cleanup(&self) -> Result<u64> {
        CsrfTokenRepository::new(self.db.pool())
            .cleanup(&to_db(&self.clock.now()))
            .await
    }
}
