//! Sliding-window rate-limit events.

use sqlx::SqlitePool;

use crate::Result;

/// Repository for rate-limit events keyed by (action, identifier).
pub struct RateLimitRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RateLimitRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Delete a key's events at or before `window_start`.
    pub async fn prune(&self, action: &str, identifier: &str, window_start: &str) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM rate_limit_events
             WHERE action = $1 AND identifier = $2 AND occurred_at <= $3",
        )
        .bind(action)
        .bind(identifier)
        .bind(window_start)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Record an event only if the key holds fewer than `ceiling` events
    /// after `window_start`.
    ///
    /// Count and insert are one statement. Returns true if recorded.
    pub async fn record_if_under(
        &self,
        action: &str,
        identifier: &str,
        window_start: &str,
        ceiling: u32,
        now: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO rate_limit_events (action, identifier, occurred_at)
             SELECT $1, $2, $3
             WHERE (SELECT COUNT(*) FROM rate_limit_events
                    WHERE action = $1 AND identifier = $2 AND occurred_at > $4) < $5",
        )
        .bind(action)
        .bind(identifier)
        .bind(now)
        .bind(window_start)
        .bind(i64::from(ceiling))
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Timestamp of the oldest event inside the window.
    pub async fn oldest_in_window(
        &self,
        action: &str,
        identifier: &str,
        window_start: &str,
    ) -> Result<Option<String>> {
        let oldest: Option<String> = sqlx::query_scalar(
            "SELECT MIN(occurred_at) FROM rate_limit_events
             WHERE action = $1 AND identifier = $2 AND occurred_at > $3",
        )
        .bind(action)
        .bind(identifier)
        .bind(window_start)
        .fetch_one(self.pool)
        .await?;
        Ok(oldest)
    }

    /// Count a key's events inside the window.
    pub async fn count_in_window(
        &self,
        action: &str,
        identifier: &str,
        window_start: &str,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rate_limit_events
             WHERE action = $1 AND identifier = $2 AND occurred_at > $3",
        )
        .bind(action)
        .bind(identifier)
        .bind(window_start)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Remove every event for a key.
    pub async fn clear(&self, action: &str, identifier: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM rate_limit_events WHERE action = $1 AND identifier = $2")
                .bind(action)
                .bind(identifier)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Remove events of `action` at or before `window_start` for all keys.
    pub async fn cleanup(&self, action: &str, window_start: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM rate_limit_events WHERE action = $1 AND occurred_at <= $2")
                .bind(action)
                .bind(window_start)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
