//! CSRF token repository.
//!
//! Tokens are stored hashed and bound to the hash of the session identifier
//! they were issued for. Consumption is a single atomic UPDATE.

use sqlx::SqlitePool;

use crate::Result;

/// Data for creating a CSRF token.
#[derive(Debug, Clone)]
pub struct NewCsrfToken {
    /// SHA-256 of the token value.
    pub token_hash: String,
    /// SHA-256 of the session identifier the token is bound to.
    pub binding_hash: String,
    pub expires_at: String,
}

/// Repository for CSRF tokens.
pub struct CsrfTokenRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CsrfTokenRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new token.
    pub async fn create(&self, token: &NewCsrfToken, now: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO csrf_tokens (token_hash, binding_hash, created_at, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(&token.token_hash)
        .bind(&token.binding_hash)
        .bind(now)
        .bind(&token.expires_at)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Mark a token as used if it is unused, unexpired and bound to `binding_hash`.
    ///
    /// Returns true only for the one caller that consumed it. Concurrent
    /// requests presenting the same token cannot both succeed.
    pub async fn consume(&self, token_hash: &str, binding_hash: &str, now: &str) -> Result<bool> {
        let consumed: Option<i64> = sqlx::query_scalar(
            "UPDATE csrf_tokens
             SET used_at = $1
             WHERE token_hash = $2
               AND binding_hash = $3
               AND used_at IS NULL
               AND expires_at > $1
             RETURNING id",
        )
        .bind(now)
        .bind(token_hash)
        .bind(binding_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(consumed.is_some())
    }

    /// Delete expired and used tokens.
    pub async fn cleanup(&self, now: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM csrf_tokens WHERE expires_at <= $1 OR used_at IS NOT NULL")
                .bind(now)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete all tokens bound to a session.
    pub async fn delete_for_binding(&self, binding_hash: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM csrf_tokens WHERE binding_hash = $1")
            .bind(binding_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
