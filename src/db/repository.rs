//! User repository for Quill.
//!
//! This module provides CRUD operations for users in the database, including
//! the atomic failed-login counter used for account lockout.

use sqlx::SqlitePool;

use super::user::{AccountStatus, NewUser, Role, User};
use crate::error::is_unique_violation;
use crate::{QuillError, Result};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, status, failed_attempts, \
                            locked_until, last_login, created_at, updated_at";

/// Outcome of recording one failed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLogin {
    /// Counter value after the update (reset to 0 when a lockout starts).
    pub failed_attempts: i64,
    /// Lockout expiry after the update.
    pub locked_until: Option<String>,
    /// Whether this failure started a new lockout.
    pub locked_now: bool,
}

/// Repository for user CRUD operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user in the database.
    ///
    /// A UNIQUE violation on username or email becomes `DuplicateIdentity`.
    pub async fn create(&self, new_user: &NewUser, now: &str) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.status)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(map_insert_error)?;

        self.fetch_created(result.last_insert_rowid()).await
    }

    /// Create a user, promoting it to an active admin if the table is empty.
    ///
    /// The emptiness check and insert are one statement, so two concurrent
    /// first registrations cannot both become admin.
    pub async fn create_promoting_first(&self, new_user: &NewUser, now: &str) -> Result<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role, status, created_at, updated_at)
             SELECT $1, $2, $3,
                    CASE WHEN EXISTS (SELECT 1 FROM users) THEN $4 ELSE 'admin' END,
                    CASE WHEN EXISTS (SELECT 1 FROM users) THEN $5 ELSE 'active' END,
                    $6, $6",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.status)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(map_insert_error)?;

        self.fetch_created(result.last_insert_rowid()).await
    }

    async fn fetch_created(&self, id: i64) -> Result<User> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| QuillError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get a user by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Look a user up by username, or by email when the identifier contains `@`.
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        if identifier.contains('@') {
            self.get_by_email(identifier).await
        } else {
            self.get_by_username(identifier).await
        }
    }

    /// Whether the username or the email is already registered.
    pub async fn identity_taken(&self, username: &str, email: &str) -> Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users
                           WHERE username = $1 COLLATE NOCASE OR email = $2 COLLATE NOCASE)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(self.pool)
        .await?;
        Ok(taken)
    }

    /// Count all users.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Record a failed login in a single statement.
    ///
    /// When the incremented counter reaches `threshold` the account is
    /// locked until `lock_until` and the counter resets to zero.
    pub async fn record_failed_login(
        &self,
        id: i64,
        threshold: u32,
        lock_until: &str,
        now: &str,
    ) -> Result<Option<FailedLogin>> {
        let row: Option<(i64, Option<String>)> = sqlx::query_as(
            "UPDATE users SET
                 failed_attempts = CASE WHEN failed_attempts + 1 >= $1 THEN 0
                                        ELSE failed_attempts + 1 END,
                 locked_until    = CASE WHEN failed_attempts + 1 >= $1 THEN $2
                                        ELSE locked_until END,
                 updated_at      = $3
             WHERE id = $4
             RETURNING failed_attempts, locked_until",
        )
        .bind(i64::from(threshold))
        .bind(lock_until)
        .bind(now)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(failed_attempts, locked_until)| {
            let locked_now = locked_until.as_deref() == Some(lock_until);
            FailedLogin {
                failed_attempts,
                locked_until,
                locked_now,
            }
        }))
    }

    /// Clear the failure counter and lockout, and stamp the last login.
    pub async fn record_successful_login(&self, id: i64, now: &str) -> Result<()> {
        sqlx::query(
            "UPDATE users
             SET failed_attempts = 0, locked_until = NULL, last_login = $1, updated_at = $1
             WHERE id = $2",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Replace the password hash.
    ///
    /// Returns false if the user does not exist.
    pub async fn update_password(&self, id: i64, password_hash: &str, now: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change a user's role.
    pub async fn set_role(&self, id: i64, role: Role, now: &str) -> Result<Option<User>> {
        let result = sqlx::query("UPDATE users SET role = $1, updated_at = $2 WHERE id = $3")
            .bind(role)
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Change a user's status.
    ///
    /// Leaving `active` deletes every session the user holds in the same
    /// transaction, so no session outlives its owner's activity.
    pub async fn set_status(
        &self,
        id: i64,
        status: AccountStatus,
        now: &str,
    ) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE users SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if status != AccountStatus::Active {
            sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        self.get_by_id(id).await
    }
}

fn map_insert_error(e: sqlx::Error) -> QuillError {
    if is_unique_violation(&e) {
        QuillError::DuplicateIdentity
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    const T0: &str = "2024-01-01 00:00:00.000000";
    const T1: &str = "2024-01-01 00:05:00.000000";
    const LOCK: &str = "2024-01-01 00:20:00.000000";

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());

        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, AccountStatus::Active);
        assert_eq!(user.failed_attempts, 0);
        assert_eq!(user.created_at, T0);

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert!(repo.get_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("Alice", "Alice@Example.com", "hash"), T0)
            .await
            .unwrap();

        assert!(repo.get_by_username("alice").await.unwrap().is_some());
        assert!(repo.get_by_email("alice@example.COM").await.unwrap().is_some());
        assert!(repo.get_by_identifier("ALICE").await.unwrap().is_some());
        assert!(repo
            .get_by_identifier("alice@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(repo.get_by_identifier("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_identity() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        repo.create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        let same_name = repo
            .create(&NewUser::new("ALICE", "other@example.com", "hash"), T0)
            .await;
        assert!(matches!(same_name, Err(QuillError::DuplicateIdentity)));

        let same_email = repo
            .create(&NewUser::new("bob", "ALICE@example.com", "hash"), T0)
            .await;
        assert!(matches!(same_email, Err(QuillError::DuplicateIdentity)));

        assert!(repo.identity_taken("alice", "x@example.com").await.unwrap());
        assert!(repo.identity_taken("x", "alice@EXAMPLE.com").await.unwrap());
        assert!(!repo.identity_taken("bob", "bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_promoting_first() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());

        let pending = AccountStatus::Pending;
        let first = repo
            .create_promoting_first(
                &NewUser::new("root", "root@example.com", "hash").with_status(pending),
                T0,
            )
            .await
            .unwrap();
        assert_eq!(first.role, Role::Admin);
        assert_eq!(first.status, AccountStatus::Active);

        let second = repo
            .create_promoting_first(
                &NewUser::new("bob", "bob@example.com", "hash").with_status(pending),
                T0,
            )
            .await
            .unwrap();
        assert_eq!(second.role, Role::User);
        assert_eq!(second.status, AccountStatus::Pending);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_record_failed_login_locks_at_threshold() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        for expected in 1..=2 {
            let r = repo
                .record_failed_login(user.id, 3, LOCK, T1)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(r.failed_attempts, expected);
            assert!(!r.locked_now);
            assert!(r.locked_until.is_none());
        }

        let r = repo
            .record_failed_login(user.id, 3, LOCK, T1)
            .await
            .unwrap()
            .unwrap();
        assert!(r.locked_now);
        assert_eq!(r.failed_attempts, 0);
        assert_eq!(r.locked_until.as_deref(), Some(LOCK));

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_locked_at(T1));
    }

    #[tokio::test]
    async fn test_record_failed_login_unknown_user() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        assert!(repo
            .record_failed_login(42, 3, LOCK, T1)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_record_successful_login_clears_lockout() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        repo.record_failed_login(user.id, 1, LOCK, T1).await.unwrap();
        repo.record_successful_login(user.id, T1).await.unwrap();

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert!(stored.locked_until.is_none());
        assert_eq!(stored.last_login.as_deref(), Some(T1));
    }

    #[tokio::test]
    async fn test_update_password() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "old"), T0)
            .await
            .unwrap();

        assert!(repo.update_password(user.id, "new", T1).await.unwrap());
        assert!(!repo.update_password(999, "new", T1).await.unwrap());

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "new");
        assert_eq!(stored.updated_at, T1);
    }

    #[tokio::test]
    async fn test_set_role() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        let updated = repo.set_role(user.id, Role::Editor, T1).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Editor);
        assert!(repo.set_role(999, Role::Admin, T1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_inactive_drops_sessions() {
        let db = setup().await;
        let repo = UserRepository::new(db.pool());
        let user = repo
            .create(&NewUser::new("alice", "alice@example.com", "hash"), T0)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO sessions (id_hash, user_id, created_at, last_activity) VALUES ('h1', $1, $2, $2)",
        )
        .bind(user.id)
        .bind(T0)
        .execute(db.pool())
        .await
        .unwrap();

        let updated = repo
            .set_status(user.id, AccountStatus::Inactive, T1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, AccountStatus::Inactive);

        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sessions, 0);

        assert!(repo
            .set_status(999, AccountStatus::Active, T1)
            .await
            .unwrap()
            .is_none());
    }
}
