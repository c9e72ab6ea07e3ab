//! User model for Quill.
//!
//! This module defines the User struct together with the Role and
//! AccountStatus enums used for authorization and lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User role for permission management.
///
/// Roles form a total order: `User < Editor < Admin`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum Role {
    /// Regular registered user.
    #[default]
    User,
    /// Can write and moderate content.
    Editor,
    /// Administrator.
    Admin,
}

impl Role {
    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Editor => "editor",
            Role::Admin => "admin",
        }
    }

    /// Check if this role has at least the required permission level.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill::db::Role;
    ///
    /// assert!(Role::Admin.can_access(Role::Editor));
    /// assert!(Role::User.can_access(Role::User));
    /// assert!(!Role::User.can_access(Role::Editor));
    /// ```
    pub fn can_access(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Account lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum AccountStatus {
    /// Registered, awaiting activation by an admin.
    Pending,
    /// May log in.
    #[default]
    Active,
    /// Deactivated; cannot log in and holds no sessions.
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            _ => Err(format!("unknown account status: {s}")),
        }
    }
}

/// User entity representing a registered user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique, case-insensitive).
    pub username: String,
    /// Email address (unique, case-insensitive).
    pub email: String,
    /// Password hash (Argon2id PHC string).
    pub password_hash: String,
    /// User role for permissions.
    pub role: Role,
    /// Account lifecycle state.
    pub status: AccountStatus,
    /// Consecutive failed logins since the last success or lockout.
    pub failed_attempts: i64,
    /// Lockout expiry, if a lockout was ever applied.
    pub locked_until: Option<String>,
    /// Last successful login.
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Check if this user has at least the required role level.
    pub fn has_role(&self, required: Role) -> bool {
        self.role >= required
    }

    /// Whether the account may hold sessions.
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Whether a lockout is in force at `now` (storage-format timestamp).
    pub fn is_locked_at(&self, now: &str) -> bool {
        self.locked_until
            .as_deref()
            .map(|until| until > now)
            .unwrap_or(false)
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Password hash (should be pre-hashed with Argon2).
    pub password_hash: String,
    /// User role (defaults to User).
    pub role: Role,
    /// Initial status (defaults to Active).
    pub status: AccountStatus,
}

impl NewUser {
    /// Create a new user with minimal required fields.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::User,
            status: AccountStatus::Active,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set the initial status.
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }
}
