//! Post repository for Quill.
//!
//! This module provides CRUD operations for posts and the deduplicated view
//! counter.

use sqlx::SqlitePool;

use super::post::{NewPost, Post, PostUpdate};
use crate::{QuillError, Result};

const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username AS author_name, p.category_id, \
                           p.title, p.body, p.status, p.view_count, p.created_at, p.updated_at \
                           FROM posts p JOIN users u ON u.id = p.author_id";

/// Repository for post CRUD operations.
pub struct PostRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PostRepository<'a> {
    /// Create a new PostRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post.
    ///
    /// Returns the created post with the assigned ID.
    pub async fn create(&self, new_post: &NewPost, now: &str) -> Result<Post> {
        let result = sqlx::query(
            "INSERT INTO posts (author_id, category_id, title, body, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(new_post.author_id)
        .bind(new_post.category_id)
        .bind(&new_post.title)
        .bind(&new_post.body)
        .bind(new_post.status)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| QuillError::NotFound("post".to_string()))
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(post)
    }

    /// List posts newest first.
    ///
    /// Drafts are included only when `include_drafts` is set.
    pub async fn list(
        &self,
        include_drafts: bool,
        category_id: Option<i64>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "{POST_SELECT}
             WHERE ($1 OR p.status = 'published')
               AND ($2 IS NULL OR p.category_id = $2)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(include_drafts)
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(posts)
    }

    /// Count posts matching the same filter as [`list`](Self::list).
    pub async fn count(&self, include_drafts: bool, category_id: Option<i64>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM posts p
             WHERE ($1 OR p.status = 'published')
               AND ($2 IS NULL OR p.category_id = $2)",
        )
        .bind(include_drafts)
        .bind(category_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Update a post by ID.
    ///
    /// Only fields that are set in the update will be modified.
    /// Returns the updated post, or None if not found.
    pub async fn update(&self, id: i64, update: &PostUpdate, now: &str) -> Result<Option<Post>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let result = sqlx::query(
            "UPDATE posts SET
                 title       = COALESCE($1, title),
                 body        = COALESCE($2, body),
                 status      = COALESCE($3, status),
                 category_id = CASE WHEN $4 THEN $5 ELSE category_id END,
                 updated_at  = $6
             WHERE id = $7",
        )
        .bind(update.title.as_deref())
        .bind(update.body.as_deref())
        .bind(update.status)
        .bind(update.category_id.is_some())
        .bind(update.category_id.flatten())
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Delete a post by ID. Comments and views go with it.
    ///
    /// Returns true if a post was deleted, false if not found.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a view and bump the counter if it is the viewer's first since
    /// `cutoff`.
    ///
    /// Returns whether the counter moved.
    pub async fn record_view(
        &self,
        post_id: i64,
        viewer_hash: &str,
        cutoff: &str,
        now: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let counted = sqlx::query(
            "INSERT INTO post_views (post_id, viewer_hash, viewed_at) VALUES ($1, $2, $3)
             ON CONFLICT (post_id, viewer_hash)
             DO UPDATE SET viewed_at = excluded.viewed_at
             WHERE post_views.viewed_at <= $4",
        )
        .bind(post_id)
        .bind(viewer_hash)
        .bind(now)
        .bind(cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if counted {
            sqlx::query("UPDATE posts SET view_count = view_count + 1 WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(counted)
    }

    /// Delete view markers older than `cutoff`.
    pub async fn cleanup_views(&self, cutoff: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM post_views WHERE viewed_at <= $1")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
