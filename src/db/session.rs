//! Server-side session records.
//!
//! Only the SHA-256 hash of a session identifier is stored; the raw value
//! lives in the client's cookie.

use sqlx::SqlitePool;

use crate::Result;

const SESSION_COLUMNS: &str = "id, id_hash, user_id, created_at, last_activity, ip, user_agent";

/// A stored session.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: i64,
    /// SHA-256 hex digest of the session identifier.
    pub id_hash: String,
    pub user_id: i64,
    pub created_at: String,
    pub last_activity: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Data for creating a session record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id_hash: String,
    pub user_id: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Repository for session records.
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new session created at `now`.
    pub async fn create(&self, new_session: &NewSession, now: &str) -> Result<SessionRecord> {
        let sql = format!(
            "INSERT INTO sessions (id_hash, user_id, created_at, last_activity, ip, user_agent)
             VALUES ($1, $2, $3, $3, $4, $5)
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(&new_session.id_hash)
            .bind(new_session.user_id)
            .bind(now)
            .bind(&new_session.ip)
            .bind(&new_session.user_agent)
            .fetch_one(self.pool)
            .await?;
        Ok(record)
    }

    /// Get a session by its identifier hash.
    pub async fn get_by_hash(&self, id_hash: &str) -> Result<Option<SessionRecord>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id_hash = $1");
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(id_hash)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    /// Refresh a session's last activity if it is still valid.
    ///
    /// The record must have been active after `idle_cutoff`, created after
    /// `absolute_cutoff`, and belong to an active user. Checking and touching
    /// happen in one statement.
    pub async fn touch_if_valid(
        &self,
        id_hash: &str,
        idle_cutoff: &str,
        absolute_cutoff: &str,
        now: &str,
    ) -> Result<Option<SessionRecord>> {
        let sql = format!(
            "UPDATE sessions SET last_activity = $1
             WHERE id_hash = $2
               AND last_activity > $3
               AND created_at > $4
               AND user_id IN (SELECT id FROM users WHERE status = 'active')
             RETURNING {SESSION_COLUMNS}"
        );
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(now)
            .bind(id_hash)
            .bind(idle_cutoff)
            .bind(absolute_cutoff)
            .fetch_optional(self.pool)
            .await?;
        Ok(record)
    }

    /// Delete a session. Returns true if one was removed.
    pub async fn delete_by_hash(&self, id_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE id_hash = $1")
            .bind(id_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session of a user.
    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count a user's sessions.
    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Delete sessions past either timeout.
    pub async fn cleanup(&self, idle_cutoff: &str, absolute_cutoff: &str) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE last_activity <= $1 OR created_at <= $2")
                .bind(idle_cutoff)
                .bind(absolute_cutoff)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
