//! Permission checking for Quill.
//!
//! Authorization is purely role based: `user < editor < admin`. There are no
//! per-resource ACLs. Each protected action is named by a [`Capability`]
//! that maps to the minimum role allowed to perform it.

use crate::db::{Role, User};
use crate::{QuillError, Result};

/// Actions that need more than anonymous access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// See draft posts.
    ReadDrafts,
    /// Comment on a published post.
    Comment,
    /// Create or edit posts.
    WritePost,
    /// Delete a comment.
    DeleteComment,
    /// Delete a post.
    DeletePost,
    /// Create categories.
    ManageCategories,
    /// Change roles and account status.
    ManageUsers,
    /// Read the audit log.
    ReadAudit,
}

impl Capability {
    /// Minimum role that holds this capability.
    pub fn minimum_role(&self) -> Role {
        match self {
            Capability::Comment => Role::User,
            Capability::ReadDrafts | Capability::WritePost | Capability::DeleteComment => {
                Role::Editor
            }
            Capability::DeletePost
            | Capability::ManageCategories
            | Capability::ManageUsers
            | Capability::ReadAudit => Role::Admin,
        }
    }
}

/// Whether the user's role is at least `minimum`.
///
/// # Examples
///
/// ```
/// use quill::auth::permission::has_role;
/// use quill::db::{AccountStatus, Role, User};
///
/// let user = User {
///     id: 1,
///     username: "alice".into(),
///     email: "alice@example.com".into(),
///     password_hash: String::new(),
///     role: Role::Editor,
///     status: AccountStatus::Active,
///     failed_attempts: 0,
///     locked_until: None,
///     last_login: None,
///     created_at: String::new(),
///     updated_at: String::new(),
/// };
/// assert!(has_role(&user, Role::User));
/// assert!(has_role(&user, Role::Editor));
/// assert!(!has_role(&user, Role::Admin));
/// ```
pub fn has_role(user: &User, minimum: Role) -> bool {
    user.role.can_access(minimum)
}

/// Require an authenticated, active user with at least `minimum` role.
///
/// No user yields `SessionExpired`; an inactive account or a lower role
/// yields `Forbidden`.
pub fn require_role(user: Option<&User>, minimum: Role) -> Result<()> {
    let user = user.ok_or(QuillError::SessionExpired)?;
    if !user.is_active() || !has_role(user, minimum) {
        return Err(QuillError::Forbidden);
    }
    Ok(())
}

/// Require the given capability.
pub fn require(user: Option<&User>, capability: Capability) -> Result<()> {
    require_role(user, capability.minimum_role())
}

/// Whether an optional user holds a capability.
pub fn can(user: Option<&User>, capability: Capability) -> bool {
    require(user, capability).is_ok()
}
