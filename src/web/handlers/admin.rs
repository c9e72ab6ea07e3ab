//! Admin handlers for Web API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::blog::Pagination;
use crate::web::dto::{
    ApiResponse, AuditEventResponse, PageQuery, PaginatedResponse, UpdateRoleRequest,
    UpdateStatusRequest, UserResponse,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::CurrentUser;

// ============================================================================
// User Management
// ============================================================================

/// PUT /api/admin/users/:id/role - Change a user's role.
pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.auth.set_role(&admin, user_id, req.role).await?;
    Ok(Json(ApiResponse::new(UserResponse::from(user))))
}

/// PUT /api/admin/users/:id/status - Activate, deactivate or approve a user.
pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.auth.set_status(&admin, user_id, req.status).await?;
    Ok(Json(ApiResponse::new(UserResponse::from(user))))
}

// ============================================================================
// Audit Log
// ============================================================================

/// GET /api/admin/audit - Page through the audit log, newest first.
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<PaginatedResponse<AuditEventResponse>>, ApiError> {
    let page = Pagination::new(query.page, query.per_page);
    let (events, total) = state
        .auth
        .list_audit(&admin, page.page, page.per_page)
        .await?;

    Ok(Json(PaginatedResponse::new(
        events.into_iter().map(AuditEventResponse::from).collect(),
        page.page,
        page.per_page,
        u64::try_from(total).unwrap_or(0),
    )))
}
