//! Web API Blog Tests
//!
//! Integration tests for posts, categories, comments and admin endpoints.

mod common;

use axum::http::{header::SET_COOKIE, StatusCode};
use axum_test::TestResponse;
use serde_json::{json, Value};

use common::{spawn_app, TestApp, ALICE};

const BOB_PASSWORD: &str = "B0b!Secure";

/// Alice (admin) on `app`, Bob (user) on a second client.
async fn setup() -> (TestApp, TestApp, i64) {
    let app = spawn_app().await;
    app.sign_in(ALICE.0, ALICE.2).await;
    let bob = app.new_client();
    let bob_id = bob.sign_in("bob", BOB_PASSWORD).await;
    (app, bob, bob_id)
}

async fn create_post(app: &TestApp, title: &str, status: &str) -> i64 {
    let response = app
        .post(
            "/api/posts",
            json!({ "title": title, "body": "Body text\nwith two lines", "status": status }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

fn clears_session_cookie(response: &TestResponse) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|c| c.starts_with("quill_session=;") && c.contains("Max-Age=0"))
}

// ============================================================================
// Posts
// ============================================================================

#[tokio::test]
async fn test_create_and_list_posts() {
    let (app, _bob, _) = setup().await;

    let response = app
        .post(
            "/api/posts",
            json!({ "title": "  Hello World  ", "body": "First post", "status": "published" }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "Hello World");
    assert_eq!(body["data"]["status"], "published");
    assert_eq!(body["data"]["author"]["username"], "alice");
    assert_eq!(body["data"]["view_count"], 0);

    create_post(&app, "Draft", "draft").await;

    let anonymous = app.new_client();
    let list: Value = anonymous.server.get("/api/posts").await.json();
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["title"], "Hello World");

    let list: Value = app.server.get("/api/posts").await.json();
    assert_eq!(list["meta"]["total"], 2);
    assert_eq!(list["data"][0]["title"], "Draft");
}

#[tokio::test]
async fn test_pagination_meta() {
    let (app, _bob, _) = setup().await;
    for i in 0..3 {
        create_post(&app, &format!("Post {i}"), "published").await;
    }

    let list: Value = app
        .server
        .get("/api/posts")
        .add_query_param("page", 2)
        .add_query_param("per_page", 2)
        .await
        .json();
    assert_eq!(list["meta"]["page"], 2);
    assert_eq!(list["meta"]["per_page"], 2);
    assert_eq!(list["meta"]["total"], 3);
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_cannot_write_posts() {
    let (_app, bob, _) = setup().await;

    let response = bob
        .post("/api/posts", json!({ "title": "Mine", "body": "Text" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_anonymous_cannot_write_posts() {
    let app = spawn_app().await;
    let response = app
        .post("/api/posts", json!({ "title": "Mine", "body": "Text" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "SESSION_EXPIRED");
}

#[tokio::test]
async fn test_post_validation() {
    let (app, _bob, _) = setup().await;

    let response = app
        .post("/api/posts", json!({ "title": "Bad\u{0007}title", "body": "" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["title"].is_array());
    assert!(body["error"]["details"]["body"].is_array());

    let response = app
        .post(
            "/api/posts",
            json!({ "title": "Fine", "body": "Fine", "category_id": 999 }),
        )
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    assert!(body["error"]["details"]["category_id"][0]
        .as_str()
        .unwrap()
        .starts_with("unknown_reference"));
}

#[tokio::test]
async fn test_update_and_publish_post() {
    let (app, _bob, _) = setup().await;
    let id = create_post(&app, "Draft", "draft").await;

    let anonymous = app.new_client();
    anonymous
        .server
        .get(&format!("/api/posts/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = app
        .put(
            &format!("/api/posts/{id}"),
            json!({ "title": "Published", "status": "published" }),
        )
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "Published");
    assert_eq!(body["data"]["body"], "Body text\nwith two lines");

    anonymous
        .server
        .get(&format!("/api/posts/{id}"))
        .await
        .assert_status_ok();

    app.put(&format!("/api/posts/{id}"), json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.put("/api/posts/9999", json!({ "title": "Nope" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_view_count_deduplicated_per_viewer() {
    let (app, _bob, _) = setup().await;
    let id = create_post(&app, "Popular", "published").await;
    let reader = app.new_client();
    let path = format!("/api/posts/{id}");

    let first: Value = reader.server.get(&path).await.json();
    assert_eq!(first["data"]["view_count"], 1);
    let again: Value = reader.server.get(&path).await.json();
    assert_eq!(again["data"]["view_count"], 1);

    app.advance(24 * 3600 + 1);
    let next_day: Value = reader.server.get(&path).await.json();
    assert_eq!(next_day["data"]["view_count"], 2);
}

#[tokio::test]
async fn test_public_reads_with_expired_session() {
    let (app, bob, _) = setup().await;
    let id = create_post(&app, "Evergreen", "published").await;
    let path = format!("/api/posts/{id}");

    let stranger = app.new_client();
    let viewed: Value = stranger.server.get(&path).await.json();
    assert_eq!(viewed["data"]["view_count"], 1);

    // an anonymous identifier is not a session and keeps its cookie
    let reader = app.new_client();
    reader.csrf().await;
    let response = reader.server.get("/api/posts").await;
    response.assert_status_ok();
    assert!(!clears_session_cookie(&response));

    app.advance(1801);

    // the dead session id is not a view key; Bob counts like any cookieless client
    let response = bob.server.get(&path).await;
    response.assert_status_ok();
    assert!(clears_session_cookie(&response));
    assert_eq!(response.json::<Value>()["data"]["view_count"], 1);

    let response = app.server.get("/api/posts").await;
    response.assert_status_ok();
    assert!(clears_session_cookie(&response));
    assert_eq!(response.json::<Value>()["meta"]["total"], 1);
}

#[tokio::test]
async fn test_delete_post_requires_admin() {
    let (app, bob, bob_id) = setup().await;
    app.put(
        &format!("/api/admin/users/{bob_id}/role"),
        json!({ "role": "editor" }),
    )
    .await
    .assert_status_ok();

    let id = create_post(&bob, "Bob's post", "published").await;
    bob.delete(&format!("/api/posts/{id}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.delete(&format!("/api/posts/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&format!("/api/posts/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Categories
// ============================================================================

#[tokio::test]
async fn test_categories() {
    let (app, bob, _) = setup().await;

    let response = app
        .post(
            "/api/categories",
            json!({ "name": "Rust News", "description": "All things Rust" }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["slug"], "rust-news");
    let category_id = body["data"]["id"].as_i64().unwrap();

    app.post("/api/categories", json!({ "name": "rust news" }))
        .await
        .assert_status(StatusCode::CONFLICT);
    bob.post("/api/categories", json!({ "name": "Bob's" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .post(
            "/api/posts",
            json!({ "title": "In category", "body": "x", "status": "published", "category_id": category_id }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    create_post(&app, "Uncategorized", "published").await;

    let list: Value = bob
        .server
        .get("/api/posts")
        .add_query_param("category", "rust-news")
        .await
        .json();
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["title"], "In category");

    bob.server
        .get("/api/posts")
        .add_query_param("category", "missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let categories: Value = bob.server.get("/api/categories").await.json();
    assert_eq!(categories["data"].as_array().unwrap().len(), 1);
    assert_eq!(categories["data"][0]["name"], "Rust News");
}

// ============================================================================
// Comments
// ============================================================================

#[tokio::test]
async fn test_comments() {
    let (app, bob, _) = setup().await;
    let published = create_post(&app, "Open", "published").await;
    let draft = create_post(&app, "Hidden", "draft").await;

    let response = bob
        .post(
            &format!("/api/posts/{published}/comments"),
            json!({ "body": "Nice post!" }),
        )
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["author"]["username"], "bob");
    let comment_id = body["data"]["id"].as_i64().unwrap();

    bob.post(
        &format!("/api/posts/{draft}/comments"),
        json!({ "body": "Sneaky" }),
    )
    .await
    .assert_status(StatusCode::NOT_FOUND);

    bob.post(
        &format!("/api/posts/{published}/comments"),
        json!({ "body": "   " }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let anonymous = app.new_client();
    let list: Value = anonymous
        .server
        .get(&format!("/api/posts/{published}/comments"))
        .await
        .json();
    assert_eq!(list["data"].as_array().unwrap().len(), 1);
    assert_eq!(list["data"][0]["body"], "Nice post!");

    bob.delete(&format!("/api/comments/{comment_id}"))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.delete(&format!("/api/comments/{comment_id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.delete(&format!("/api/comments/{comment_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// ============================================================================
// Admin
// ============================================================================

#[tokio::test]
async fn test_admin_role_and_status_changes() {
    let (app, bob, bob_id) = setup().await;

    bob.server
        .get("/api/admin/audit")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = app
        .put(
            &format!("/api/admin/users/{bob_id}/role"),
            json!({ "role": "editor" }),
        )
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["role"], "editor");

    let me: Value = bob.server.get("/api/me").await.json();
    assert_eq!(me["data"]["role"], "editor");

    app.put(
        &format!("/api/admin/users/{bob_id}/role"),
        json!({ "role": "root" }),
    )
    .await
    .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .put(
            &format!("/api/admin/users/{bob_id}/status"),
            json!({ "status": "inactive" }),
        )
        .await;
    response.assert_status_ok();
    bob.server
        .get("/api/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    bob.login("bob", BOB_PASSWORD)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.put("/api/admin/users/9999/role", json!({ "role": "user" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_demote_self() {
    let app = spawn_app().await;
    let alice_id = app.sign_in(ALICE.0, ALICE.2).await;

    app.put(
        &format!("/api/admin/users/{alice_id}/role"),
        json!({ "role": "user" }),
    )
    .await
    .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_audit_log() {
    let (app, _bob, _) = setup().await;
    create_post(&app, "Audited", "published").await;

    let response = app
        .server
        .get("/api/admin/audit")
        .add_query_param("per_page", 100)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let events: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert!(events.contains(&"user_registered"));
    assert!(events.contains(&"login_succeeded"));
    assert!(events.contains(&"post_created"));
    assert_eq!(body["meta"]["total"].as_u64().unwrap() as usize, events.len());
}
