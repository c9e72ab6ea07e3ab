//! Category handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, CategoryResponse, CreateCategoryRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::CurrentUser;

/// GET /api/categories - All categories by name.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, ApiError> {
    let categories = state.blog.list_categories().await?;
    Ok(Json(ApiResponse::new(
        categories.into_iter().map(CategoryResponse::from).collect(),
    )))
}

/// POST /api/categories - Create a category (admin).
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    let category = state
        .blog
        .create_category(&user, &req.name, req.description)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CategoryResponse::from(category))),
    ))
}
