//! Category repository for Quill.

use sqlx::SqlitePool;

use super::category::{Category, NewCategory};
use crate::error::is_unique_violation;
use crate::{QuillError, Result};

/// Repository for categories.
pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a category. A name or slug clash becomes `DuplicateIdentity`.
    pub async fn create(&self, new_category: &NewCategory, now: &str) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug, description, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, name, slug, description, created_at",
        )
        .bind(&new_category.name)
        .bind(&new_category.slug)
        .bind(&new_category.description)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                QuillError::DuplicateIdentity
            } else {
                e.into()
            }
        })?;
        Ok(category)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// All categories ordered by name.
    pub async fn list(&self) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM categories
             ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }
}
