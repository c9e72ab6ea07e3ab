//! Category model for Quill.

/// A post category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    /// Display name, unique ignoring case.
    pub name: String,
    /// URL-safe identifier derived from the name.
    pub slug: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Data for creating a category.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl NewCategory {
    /// Build a category with its slug derived from `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self {
            name,
            slug,
            description: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// Derive a slug: lowercase ASCII letters and digits, runs of anything else
/// collapsed to a single `-`, no leading or trailing `-`.
///
/// # Examples
///
/// ```
/// use quill::blog::slugify;
///
/// assert_eq!(slugify("Rust & Systems"), "rust-systems");
/// assert_eq!(slugify("  Café 2024  "), "caf-2024");
/// assert_eq!(slugify("!!!"), "");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
