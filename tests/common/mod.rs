//! Test helpers for Web API tests.
//!
//! Builds the full router over an in-memory database with a manual clock,
//! and wraps the CSRF handshake every state-changing request needs.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestResponse, TestServer};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

use quill::auth::{ManualClock, OsRandom};
use quill::config::{Config, RateLimitRule};
use quill::web::{create_router, AppState};
use quill::Database;

/// The sample account used across scenarios.
pub const ALICE: (&str, &str, &str) = ("alice", "alice@example.com", "Str0ng!Pass");

/// Configuration with cheap hashing, plain-HTTP cookies and generous limits.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.argon2.memory_kib = 1024;
    config.auth.argon2.iterations = 1;
    config.auth.argon2.parallelism = 1;
    config.web.cookie_secure = false;
    config.rate_limit.login = RateLimitRule::new(1000, 300);
    config.rate_limit.register = RateLimitRule::new(1000, 3600);
    config.rate_limit.comment = RateLimitRule::new(1000, 60);
    config.rate_limit.post = RateLimitRule::new(1000, 3600);
    config
}

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub clock: Arc<ManualClock>,
    pub state: Arc<AppState>,
}

/// Start an application with [`test_config`].
pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// Start an application with the given configuration.
pub async fn spawn_app_with(config: Config) -> TestApp {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to create test database");
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let state = Arc::new(
        AppState::with_services(db, &config, clock.clone(), Arc::new(OsRandom))
            .expect("Failed to build app state"),
    );

    let mut server =
        TestServer::new(create_router(state.clone())).expect("Failed to create test server");
    server.save_cookies();

    TestApp {
        server,
        clock,
        state,
    }
}

fn csrf_header() -> HeaderName {
    HeaderName::from_static("x-csrf-token")
}

impl TestApp {
    /// Fetch a fresh CSRF token (sets an anonymous session cookie if needed).
    pub async fn csrf(&self) -> String {
        let response = self.server.get("/api/csrf-token").await;
        response.assert_status_ok();
        response.json::<Value>()["data"]["token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }

    /// POST JSON with a fresh CSRF token.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        let token = self.csrf().await;
        self.server
            .post(path)
            .add_header(csrf_header(), HeaderValue::from_str(&token).unwrap())
            .json(&body)
            .await
    }

    /// PUT JSON with a fresh CSRF token.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        let token = self.csrf().await;
        self.server
            .put(path)
            .add_header(csrf_header(), HeaderValue::from_str(&token).unwrap())
            .json(&body)
            .await
    }

    /// DELETE with a fresh CSRF token.
    pub async fn delete(&self, path: &str) -> TestResponse {
        let token = self.csrf().await;
        self.server
            .delete(path)
            .add_header(csrf_header(), HeaderValue::from_str(&token).unwrap())
            .await
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post(
            "/api/register",
            json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }

    pub async fn login(&self, identifier: &str, password: &str) -> TestResponse {
        self.post(
            "/api/login",
            json!({ "identifier": identifier, "password": password }),
        )
        .await
    }

    pub async fn logout(&self) -> TestResponse {
        self.post("/api/logout", json!({})).await
    }

    /// Register and log in. Returns the user id.
    pub async fn sign_in(&self, username: &str, password: &str) -> i64 {
        let email = format!("{username}@example.com");
        let response = self.register(username, &email, password).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let id = response.json::<Value>()["data"]["id"].as_i64().unwrap();
        self.login(username, password).await.assert_status_ok();
        id
    }

    /// A second browser against the same application, with its own cookies.
    pub fn new_client(&self) -> TestApp {
        let mut server = TestServer::new(create_router(self.state.clone()))
            .expect("Failed to create test server");
        server.save_cookies();
        TestApp {
            server,
            clock: self.clock.clone(),
            state: self.state.clone(),
        }
    }

    /// Move the manual clock forward.
    pub fn advance(&self, secs: i64) {
        self.clock.advance(Duration::seconds(secs));
    }
}
