//! Append-only audit log.

use sqlx::SqlitePool;

use crate::Result;

/// A recorded audit event.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: i64,
    pub user_id: Option<i64>,
    pub event: String,
    pub detail: Option<String>,
    pub ip: Option<String>,
    pub created_at: String,
}

/// Data for a new audit event.
#[derive(Debug, Clone, Default)]
pub struct NewAuditEvent {
    pub user_id: Option<i64>,
    pub event: String,
    pub detail: Option<String>,
    pub ip: Option<String>,
}

impl NewAuditEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Default::default()
        }
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event.
    pub async fn record(&self, event: &NewAuditEvent, now: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO audit_log (user_id, event, detail, ip, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(event.user_id)
        .bind(&event.event)
        .bind(&event.detail)
        .bind(&event.ip)
        .bind(now)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// List events, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT id, user_id, event, detail, ip, created_at
             FROM audit_log
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(events)
    }

    /// Count all events.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// List a user's events, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT id, user_id, event, detail, ip, created_at
             FROM audit_log
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(events)
    }
}
