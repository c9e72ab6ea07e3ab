//! Blog module for Quill.
//!
//! This module provides the content side of the service:
//! - Posts with draft/published status and a deduplicated view counter
//! - Categories with derived slugs
//! - Comments on visible posts
//! - Role-based access control through [`BlogService`]

mod category;
mod category_repository;
mod comment;
mod comment_repository;
mod post;
mod post_repository;
mod service;

pub use category::{slugify, Category, NewCategory};
pub use category_repository::CategoryRepository;
pub use comment::{Comment, NewComment};
pub use comment_repository::CommentRepository;
pub use post::{NewPost, Post, PostStatus, PostUpdate};
pub use post_repository::PostRepository;
pub use service::{
    check_text, BlogService, PaginatedResult, Pagination, PostDraft, MAX_BODY_LENGTH,
    MAX_CATEGORY_DESCRIPTION_LENGTH, MAX_CATEGORY_NAME_LENGTH, MAX_COMMENT_LENGTH, MAX_PER_PAGE,
    MAX_TITLE_LENGTH,
};
