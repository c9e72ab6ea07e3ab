//! Post model for Quill.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Publication state of a post.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum PostStatus {
    /// Visible to editors and admins only.
    #[default]
    Draft,
    /// Visible to everyone.
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            _ => Err(format!("unknown post status: {s}")),
        }
    }
}

/// A blog post, joined with its author's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    /// Username of the author.
    pub author_name: String,
    pub category_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub status: PostStatus,
    /// Deduplicated view counter.
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Data for creating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub status: PostStatus,
}

impl NewPost {
    /// A draft without a category.
    pub fn new(author_id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author_id,
            category_id: None,
            title: title.into(),
            body: body.into(),
            status: PostStatus::Draft,
        }
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial update of a post. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub status: Option<PostStatus>,
    /// `Some(None)` clears the category.
    pub category_id: Option<Option<i64>>,
}

impl PostUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.body.is_none()
            && self.status.is_none()
            && self.category_id.is_none()
    }
}
