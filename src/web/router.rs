//! Router configuration for Web API.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    change_password, create_category, create_comment, create_post, csrf_token, delete_comment,
    delete_post, get_post, list_audit, list_categories, list_comments, list_posts, login, logout,
    me, register, update_post, update_user_role, update_user_status, AppState,
};
use super::middleware::{
    clear_expired_session, create_cors_layer, require_csrf, security_headers,
};

/// Create the main API router, including `/health`.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Session and account routes
    let auth_routes = Router::new()
        .route("/csrf-token", get(csrf_token))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", post(change_password));

    // Content routes
    let blog_routes = Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:id/comments", get(list_comments).post(create_comment))
        .route("/comments/:id", delete(delete_comment))
        .route("/categories", get(list_categories).post(create_category));

    // Admin routes
    let admin_routes = Router::new()
        .route("/users/:id/role", put(update_user_role))
        .route("/users/:id/status", put(update_user_status))
        .route("/audit", get(list_audit));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(blog_routes)
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_csrf,
        ));

    Router::new()
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn_with_state(
                    app_state.security.clone(),
                    security_headers,
                ))
                .layer(create_cors_layer(&app_state.web.cors_origins))
                .layer(middleware::from_fn_with_state(
                    app_state.clone(),
                    clear_expired_session,
                )),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router<S: Clone + Send + Sync + 'static>() -> Router<S> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
