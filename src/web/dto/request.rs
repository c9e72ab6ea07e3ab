//! Request DTOs for the HTTP API.
//!
//! Credential requests are plain JSON; their rules live in
//! `auth::validation` so that every violation is reported together.
//! Content requests are checked with `validator` derives.

use serde::{Deserialize, Deserializer};
use validator::Validate;

use super::validation::{no_control_chars, text_block, text_line};
use crate::blog::PostStatus;
use crate::db::{AccountStatus, Role};

/// Login request. `identifier` is a username or an email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// User registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Password change request.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Create post request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200), custom(function = "text_line"))]
    pub title: String,
    #[validate(length(min = 1, max = 50000), custom(function = "text_block"))]
    pub body: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: PostStatus,
}

/// Update post request. Absent fields are left unchanged.
///
/// `category_id: null` clears the category; omitting it keeps it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200), custom(function = "text_line"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 50000), custom(function = "text_block"))]
    pub body: Option<String>,
    pub status: Option<PostStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
}

/// Distinguish an explicit `null` from a missing field.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

/// Create comment request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000), custom(function = "text_block"))]
    pub body: String,
}

/// Create category request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100), custom(function = "text_line"))]
    pub name: String,
    #[validate(length(max = 1000), custom(function = "no_control_chars"))]
    #[serde(default)]
    pub description: Option<String>,
}

/// Role change request (admin).
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// Account status change request (admin).
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AccountStatus,
}

/// Pagination and filter query parameters.
#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
}

/// Pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::{MAX_BODY_LENGTH, MAX_COMMENT_LENGTH, MAX_TITLE_LENGTH};

    #[test]
    fn test_create_post_validation() {
        let ok: CreatePostRequest =
            serde_json::from_str(r#"{"title": "Hello", "body": "Line 1\nLine 2"}"#).unwrap();
        assert!(ok.validate().is_ok());
        assert_eq!(ok.status, PostStatus::Draft);

        let bad: CreatePostRequest =
            serde_json::from_str(r#"{"title": "Bad\u0007", "body": "   "}"#).unwrap();
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("body"));
    }

    #[test]
    fn test_update_post_category_null_vs_missing() {
        let missing: UpdatePostRequest = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(missing.category_id, None);

        let cleared: UpdatePostRequest =
            serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let set: UpdatePostRequest = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(4)));
    }

    #[test]
    fn test_limits_match_service() {
        let title = CreatePostRequest {
            title: "t".repeat(MAX_TITLE_LENGTH + 1),
            body: "b".repeat(MAX_BODY_LENGTH),
            category_id: None,
            status: PostStatus::Draft,
        };
        let errors = title.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(!errors.field_errors().contains_key("body"));
    }

    #[test]
    fn test_comment_too_long() {
        let req = CreateCommentRequest {
            body: "x".repeat(MAX_COMMENT_LENGTH + 1),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_role_request_parses_lowercase() {
        let req: UpdateRoleRequest = serde_json::from_str(r#"{"role": "editor"}"#).unwrap();
        assert_eq!(req.role, Role::Editor);
        assert!(serde_json::from_str::<UpdateRoleRequest>(r#"{"role": "root"}"#).is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let q: PostListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.per_page, 20);
        assert!(q.category.is_none());
    }
}
