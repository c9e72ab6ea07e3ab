//! Comment model for Quill.

/// A comment on a post, joined with its author's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

/// Data for creating a comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub author_id: i64,
    pub body: String,
}

impl NewComment {
    pub fn new(post_id: i64, author_id: i64, body: impl Into<String>) -> Self {
        Self {
            post_id,
            author_id,
            body: body.into(),
        }
    }
}
