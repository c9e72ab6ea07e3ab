//! Blog service for Quill.
//!
//! This module provides high-level operations for posts, categories and
//! comments with built-in permission checking and pagination support.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use super::category::{slugify, Category, NewCategory};
use super::category_repository::CategoryRepository;
use super::comment::{Comment, NewComment};
use super::comment_repository::CommentRepository;
use super::post::{NewPost, Post, PostStatus, PostUpdate};
use super::post_repository::PostRepository;
use crate::auth::{can, hash_token, require, Action, Capability, Clock, RateLimiter, Rule, Violation};
use crate::datetime::to_db;
use crate::db::{AuditRepository, Database, NewAuditEvent, User};
use crate::{QuillError, Result};

/// Maximum length for post titles (in characters).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for post bodies (in characters).
pub const MAX_BODY_LENGTH: usize = 50_000;

/// Maximum length for comment bodies (in characters).
pub const MAX_COMMENT_LENGTH: usize = 5_000;

/// Maximum length for category names (in characters).
pub const MAX_CATEGORY_NAME_LENGTH: usize = 100;

/// Maximum length for category descriptions (in characters).
pub const MAX_CATEGORY_DESCRIPTION_LENGTH: usize = 1_000;

/// Largest page size accepted.
pub const MAX_PER_PAGE: u32 = 100;

/// Window in which repeated views by one viewer count once.
const VIEW_DEDUP_HOURS: i64 = 24;

/// Check a text field for emptiness, length and control characters.
///
/// `multiline` allows `\n`, `\r` and `\t`.
pub fn check_text(field: &'static str, value: &str, max: usize, multiline: bool) -> Vec<Violation> {
    let mut violations = Vec::new();
    if value.trim().is_empty() {
        violations.push(Violation::new(field, Rule::Required));
        return violations;
    }
    if value.chars().count() > max {
        violations.push(Violation::new(field, Rule::TooLong { max }));
    }
    if value
        .chars()
        .any(|c| c.is_control() && !(multiline && matches!(c, '\n' | '\r' | '\t')))
    {
        violations.push(Violation::new(field, Rule::ControlCharacters));
    }
    violations
}

/// Page request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    /// Create pagination, clamping to `1..` pages and `1..=MAX_PER_PAGE`
    /// items.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// Result of a paginated query.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total number of items (across all pages).
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PaginatedResult<T> {
    /// Check if there are more items after this page.
    pub fn has_more(&self) -> bool {
        i64::from(self.page) * i64::from(self.per_page) < self.total
    }

    pub fn total_pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total + per_page - 1) / per_page
    }
}

/// Input for creating a post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub title: String,
    pub body: String,
    pub category_id: Option<i64>,
    pub status: PostStatus,
}

/// Service for blog operations with permission checking.
#[derive(Clone)]
pub struct BlogService {
    db: Database,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
}

impl BlogService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, limiter: RateLimiter) -> Self {
        Self { db, clock, limiter }
    }

    fn now(&self) -> String {
        to_db(&self.clock.now())
    }

    async fn audit(&self, event: NewAuditEvent) -> Result<()> {
        AuditRepository::new(self.db.pool())
            .record(&event, &self.now())
            .await?;
        Ok(())
    }

    /// Fetch a post the viewer may see, or `NotFound`.
    async fn visible_post(&self, viewer: Option<&User>, post_id: i64) -> Result<Post> {
        let post = PostRepository::new(self.db.pool())
            .get_by_id(post_id)
            .await?
            .ok_or_else(|| QuillError::NotFound("post".to_string()))?;

        if post.is_published() || can(viewer, Capability::ReadDrafts) {
            Ok(post)
        } else {
            Err(QuillError::NotFound("post".to_string()))
        }
    }

    async fn check_category(&self, category_id: Option<i64>) -> Result<()> {
        if let Some(id) = category_id {
            if CategoryRepository::new(self.db.pool())
                .get_by_id(id)
                .await?
                .is_none()
            {
                return Err(QuillError::invalid("category_id", Rule::UnknownReference));
            }
        }
        Ok(())
    }

    // ========== Posts ==========

    /// List posts newest first. Drafts are included for editors and admins.
    ///
    /// `category` filters by slug; an unknown slug is `NotFound`.
    pub async fn list_posts(
        &self,
        viewer: Option<&User>,
        pagination: Pagination,
        category: Option<&str>,
    ) -> Result<PaginatedResult<Post>> {
        let category_id = match category {
            Some(slug) => Some(
                CategoryRepository::new(self.db.pool())
                    .get_by_slug(slug)
                    .await?
                    .ok_or_else(|| QuillError::NotFound("category".to_string()))?
                    .id,
            ),
            None => None,
        };

        let include_drafts = can(viewer, Capability::ReadDrafts);
        let repo = PostRepository::new(self.db.pool());
        let total = repo.count(include_drafts, category_id).await?;
        let items = repo
            .list(
                include_drafts,
                category_id,
                pagination.offset(),
                pagination.limit(),
            )
            .await?;

        Ok(PaginatedResult {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    /// Fetch a post and count the view.
    ///
    /// `viewer_key` identifies the reader (session id or client IP); it is
    /// hashed before storage. One view per key per post per 24 hours counts.
    pub async fn get_post(
        &self,
        viewer: Option<&User>,
        post_id: i64,
        viewer_key: &str,
    ) -> Result<Post> {
        let mut post = self.visible_post(viewer, post_id).await?;

        let now = self.clock.now();
        let cutoff = to_db(&(now - Duration::hours(VIEW_DEDUP_HOURS)));
        let counted = PostRepository::new(self.db.pool())
            .record_view(post.id, &hash_token(viewer_key), &cutoff, &to_db(&now))
            .await?;
        if counted {
            post.view_count += 1;
        }
        Ok(post)
    }

    /// Create a post. Editor or above; rate limited per author.
    pub async fn create_post(&self, actor: &User, draft: PostDraft) -> Result<Post> {
        require(Some(actor), Capability::WritePost)?;
        self.limiter
            .check_and_record(Action::Post, &actor.id.to_string())
            .await?;

        let mut violations = check_text("title", &draft.title, MAX_TITLE_LENGTH, false);
        violations.extend(check_text("body", &draft.body, MAX_BODY_LENGTH, true));
        if !violations.is_empty() {
            return Err(QuillError::ValidationFailed(violations));
        }
        self.check_category(draft.category_id).await?;

        let new_post = NewPost::new(actor.id, draft.title.trim(), draft.body)
            .with_category(draft.category_id)
            .with_status(draft.status);
        let post = PostRepository::new(self.db.pool())
            .create(&new_post, &self.now())
            .await?;

        self.audit(
            NewAuditEvent::new("post_created")
                .user(actor.id)
                .detail(format!("post_id={} status={}", post.id, post.status)),
        )
        .await?;
        info!(post_id = post.id, author_id = actor.id, status = %post.status, "Post created");
        Ok(post)
    }

    /// Update a post. Editor or above.
    pub async fn update_post(&self, actor: &User, post_id: i64, update: PostUpdate) -> Result<Post> {
        require(Some(actor), Capability::WritePost)?;

        let mut violations = Vec::new();
        if let Some(title) = &update.title {
            violations.extend(check_text("title", title, MAX_TITLE_LENGTH, false));
        }
        if let Some(body) = &update.body {
            violations.extend(check_text("body", body, MAX_BODY_LENGTH, true));
        }
        if !violations.is_empty() {
            return Err(QuillError::ValidationFailed(violations));
        }
        if let Some(category_id) = update.category_id {
            self.check_category(category_id).await?;
        }

        let update = PostUpdate {
            title: update.title.map(|t| t.trim().to_string()),
            ..update
        };
        let post = PostRepository::new(self.db.pool())
            .update(post_id, &update, &self.now())
            .await?
            .ok_or_else(|| QuillError::NotFound("post".to_string()))?;

        self.audit(
            NewAuditEvent::new("post_updated")
                .user(actor.id)
                .detail(format!("post_id={post_id}")),
        )
        .await?;
        info!(post_id, actor_id = actor.id, "Post updated");
        Ok(post)
    }

    /// Delete a post with its comments. Admin only.
    pub async fn delete_post(&self, actor: &User, post_id: i64) -> Result<()> {
        require(Some(actor), Capability::DeletePost)?;

        if !PostRepository::new(self.db.pool()).delete(post_id).await? {
            return Err(QuillError::NotFound("post".to_string()));
        }

        self.audit(
            NewAuditEvent::new("post_deleted")
                .user(actor.id)
                .detail(format!("post_id={post_id}")),
        )
        .await?;
        info!(post_id, actor_id = actor.id, "Post deleted");
        Ok(())
    }

    // ========== Categories ==========

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        CategoryRepository::new(self.db.pool()).list().await
    }

    /// Create a category. Admin only; the slug is derived from the name.
    pub async fn create_category(
        &self,
        actor: &User,
        name: &str,
        description: Option<String>,
    ) -> Result<Category> {
        require(Some(actor), Capability::ManageCategories)?;

        let mut violations = check_text("name", name, MAX_CATEGORY_NAME_LENGTH, false);
        if violations.is_empty() && slugify(name).is_empty() {
            violations.push(Violation::new("name", Rule::InvalidCharacters));
        }
        if let Some(description) = &description {
            if !description.is_empty() {
                violations.extend(check_text(
                    "description",
                    description,
                    MAX_CATEGORY_DESCRIPTION_LENGTH,
                    true,
                ));
            }
        }
        if !violations.is_empty() {
            return Err(QuillError::ValidationFailed(violations));
        }

        let category = CategoryRepository::new(self.db.pool())
            .create(
                &NewCategory::new(name.trim()).with_description(description),
                &self.now(),
            )
            .await?;

        self.audit(
            NewAuditEvent::new("category_created")
                .user(actor.id)
                .detail(format!("slug={}", category.slug)),
        )
        .await?;
        info!(category_id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    // ========== Comments ==========

    /// Comments on a post the viewer can see.
    pub async fn list_comments(&self, viewer: Option<&User>, post_id: i64) -> Result<Vec<Comment>> {
        self.visible_post(viewer, post_id).await?;
        CommentRepository::new(self.db.pool())
            .list_by_post(post_id)
            .await
    }

    /// Comment on a post. Any active user; rate limited per user.
    pub async fn add_comment(&self, actor: &User, post_id: i64, body: &str) -> Result<Comment> {
        require(Some(actor), Capability::Comment)?;
        self.limiter
            .check_and_record(Action::Comment, &actor.id.to_string())
            .await?;

        let violations = check_text("body", body, MAX_COMMENT_LENGTH, true);
        if !violations.is_empty() {
            return Err(QuillError::ValidationFailed(violations));
        }
        self.visible_post(Some(actor), post_id).await?;

        let comment = CommentRepository::new(self.db.pool())
            .create(&NewComment::new(post_id, actor.id, body), &self.now())
            .await?;
        debug!(comment_id = comment.id, post_id, author_id = actor.id, "Comment added");
        Ok(comment)
    }

    /// Delete a comment. Editor or above.
    pub async fn delete_comment(&self, actor: &User, comment_id: i64) -> Result<()> {
        require(Some(actor), Capability::DeleteComment)?;

        if !CommentRepository::new(self.db.pool())
            .delete(comment_id)
            .await?
        {
            return Err(QuillError::NotFound("comment".to_string()));
        }

        self.audit(
            NewAuditEvent::new("comment_deleted")
                .user(actor.id)
                .detail(format!("comment_id={comment_id}")),
        )
        .await?;
        info!(comment_id, actor_id = actor.id, "Comment deleted");
        Ok(())
    }

    /// Purge view markers that no longer affect deduplication.
    pub async fn cleanup_views(&self) -> Result<u64> {
        let cutoff = to_db(&(self.clock.now() - Duration::hours(VIEW_DEDUP_HOURS)));
        PostRepository::new(self.db.pool()).cleanup_views(&cutoff).await
    }
}
