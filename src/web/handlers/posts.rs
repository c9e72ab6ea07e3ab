//! Post and comment handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;

use crate::auth::ClientInfo;
use crate::blog::{Pagination, PostDraft, PostUpdate};
use crate::web::dto::{
    ApiResponse, CommentResponse, CreateCommentRequest, CreatePostRequest, PaginatedResponse,
    PostListQuery, PostResponse, UpdatePostRequest, ValidatedJson,
};
use crate::web::error::{ApiError, ClearSessionCookie};
use crate::web::handlers::AppState;
use crate::web::middleware::{CurrentUser, MaybeUser, SessionCookie};

/// Set when an optional-session request carried an expired session cookie.
type ClearCookie = Option<Extension<ClearSessionCookie>>;

/// GET /api/posts - List posts, newest first.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Query(query): Query<PostListQuery>,
) -> Result<(ClearCookie, Json<PaginatedResponse<PostResponse>>), ApiError> {
    let page = state
        .blog
        .list_posts(
            viewer.user.as_ref(),
            Pagination::new(query.page, query.per_page),
            query.category.as_deref(),
        )
        .await?;

    Ok((
        viewer.clear_cookie(),
        Json(PaginatedResponse::from_page(page, PostResponse::from)),
    ))
}

/// GET /api/posts/:id - Fetch a post and count the view.
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    SessionCookie(session): SessionCookie,
    client: ClientInfo,
    Path(post_id): Path<i64>,
) -> Result<(ClearCookie, Json<ApiResponse<PostResponse>>), ApiError> {
    // an expired session's identifier is dead; count by address instead
    let viewer_key = match (&viewer.user, session) {
        (Some(user), _) => format!("user:{}", user.id),
        (None, Some(session)) if !viewer.expired => format!("session:{session}"),
        (None, _) => format!("ip:{}", client.ip),
    };

    let post = state
        .blog
        .get_post(viewer.user.as_ref(), post_id, &viewer_key)
        .await?;
    Ok((
        viewer.clear_cookie(),
        Json(ApiResponse::new(PostResponse::from(post))),
    ))
}

/// POST /api/posts - Create a post (editor).
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PostResponse>>), ApiError> {
    let post = state
        .blog
        .create_post(
            &user,
            PostDraft {
                title: req.title,
                body: req.body,
                category_id: req.category_id,
                status: req.status,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(PostResponse::from(post))),
    ))
}

/// PUT /api/posts/:id - Update a post (editor).
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdatePostRequest>,
) -> Result<Json<ApiResponse<PostResponse>>, ApiError> {
    let update = PostUpdate {
        title: req.title,
        body: req.body,
        status: req.status,
        category_id: req.category_id,
    };
    if update.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let post = state.blog.update_post(&user, post_id, update).await?;
    Ok(Json(ApiResponse::new(PostResponse::from(post))))
}

/// DELETE /api/posts/:id - Delete a post and its comments (admin).
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog.delete_post(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/posts/:id/comments - Comments on a visible post.
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    viewer: MaybeUser,
    Path(post_id): Path<i64>,
) -> Result<(ClearCookie, Json<ApiResponse<Vec<CommentResponse>>>), ApiError> {
    let comments = state
        .blog
        .list_comments(viewer.user.as_ref(), post_id)
        .await?;
    Ok((
        viewer.clear_cookie(),
        Json(ApiResponse::new(
            comments.into_iter().map(CommentResponse::from).collect(),
        )),
    ))
}

/// POST /api/posts/:id/comments - Comment on a post.
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>), ApiError> {
    let comment = state.blog.add_comment(&user, post_id, &req.body).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CommentResponse::from(comment))),
    ))
}

/// DELETE /api/comments/:id - Delete a comment (editor).
pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.blog.delete_comment(&user, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
