//! Comment repository for Quill.

use sqlx::SqlitePool;

use super::comment::{Comment, NewComment};
use crate::{QuillError, Result};

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, u.username AS author_name, \
                              c.body, c.created_at \
                              FROM comments c JOIN users u ON u.id = c.author_id";

/// Repository for comments.
pub struct CommentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a comment and return it with its author's name.
    pub async fn create(&self, new_comment: &NewComment, now: &str) -> Result<Comment> {
        let result = sqlx::query(
            "INSERT INTO comments (post_id, author_id, body, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(new_comment.post_id)
        .bind(new_comment.author_id)
        .bind(&new_comment.body)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| QuillError::NotFound("comment".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(comment)
    }

    /// Comments on a post, oldest first.
    pub async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id ASC"
        ))
        .bind(post_id)
        .fetch_all(self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn count_by_post(&self, post_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Returns true if a comment was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
