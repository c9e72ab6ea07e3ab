//! Response DTOs for the HTTP API.
//!
//! Timestamps are rendered as RFC 3339.

use serde::Serialize;

use crate::blog::{Category, Comment, PaginatedResult, Post, PostStatus};
use crate::datetime::to_rfc3339;
use crate::db::{AccountStatus, AuditEvent, Role, User};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }

    /// Convert a service page, mapping each item.
    pub fn from_page<S>(page: PaginatedResult<S>, f: impl FnMut(S) -> T) -> Self {
        let total = u64::try_from(page.total).unwrap_or(0);
        Self::new(
            page.items.into_iter().map(f).collect(),
            page.page,
            page.per_page,
            total,
        )
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// Freshly issued CSRF token.
#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

/// User information in responses.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            status: user.status,
            created_at: to_rfc3339(&user.created_at),
            last_login_at: user.last_login.as_deref().map(to_rfc3339),
        }
    }
}

// ============================================================================
// Blog DTOs
// ============================================================================

/// Post in responses.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub status: PostStatus,
    pub category_id: Option<i64>,
    pub author: AuthorInfo,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Author summary.
#[derive(Debug, Serialize)]
pub struct AuthorInfo {
    pub id: i64,
    pub username: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            body: post.body,
            status: post.status,
            category_id: post.category_id,
            author: AuthorInfo {
                id: post.author_id,
                username: post.author_name,
            },
            view_count: post.view_count,
            created_at: to_rfc3339(&post.created_at),
            updated_at: to_rfc3339(&post.updated_at),
        }
    }
}

/// Category in responses.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            slug: category.slug,
            description: category.description,
        }
    }
}

/// Comment in responses.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
    pub author: AuthorInfo,
    pub created_at: String,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            body: comment.body,
            author: AuthorInfo {
                id: comment.author_id,
                username: comment.author_name,
            },
            created_at: to_rfc3339(&comment.created_at),
        }
    }
}

// ============================================================================
// Admin DTOs
// ============================================================================

/// Audit log entry.
#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub id: i64,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub created_at: String,
}

impl From<AuditEvent> for AuditEventResponse {
    fn from(event: AuditEvent) -> Self {
        Self {
            id: event.id,
            event: event.event,
            user_id: event.user_id,
            detail: event.detail,
            ip: event.ip,
            created_at: to_rfc3339(&event.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_response_hides_secrets() {
        let user = User {
            id: 7,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Editor,
            status: AccountStatus::Active,
            failed_attempts: 2,
            locked_until: None,
            last_login: None,
            created_at: "2024-01-01 10:00:00.000000".into(),
            updated_at: "2024-01-01 10:00:00.000000".into(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["role"], "editor");
        assert_eq!(json["status"], "active");
        assert_eq!(json["created_at"], "2024-01-01T10:00:00Z");
        assert!(json.get("password_hash").is_none());
        assert!(json.get("last_login_at").is_none());
    }

    #[test]
    fn test_paginated_from_page() {
        let page = PaginatedResult {
            items: vec![1, 2],
            total: 12,
            page: 2,
            per_page: 2,
        };
        let response = PaginatedResponse::from_page(page, |n| n * 10);
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["data"], serde_json::json!([10, 20]));
        assert_eq!(json["meta"]["total"], 12);
        assert_eq!(json["meta"]["page"], 2);
    }
}
