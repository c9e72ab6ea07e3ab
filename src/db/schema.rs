//! Database schema and migrations for Quill.
//!
//! Migrations are applied in order the first time the database is opened or
//! after an upgrade. Timestamps are TEXT in `YYYY-MM-DD HH:MM:SS.ffffff` UTC.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: users
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash   TEXT NOT NULL,                     -- Argon2id PHC string
    role            TEXT NOT NULL DEFAULT 'user'
                    CHECK (role IN ('user', 'editor', 'admin')),
    status          TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('pending', 'active', 'inactive')),
    failed_attempts INTEGER NOT NULL DEFAULT 0,
    locked_until    TEXT,
    last_login      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX idx_users_role ON users(role);
"#,
    // v2: server-side sessions
    r#"
CREATE TABLE sessions (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    id_hash         TEXT NOT NULL UNIQUE,              -- SHA-256 of the cookie value
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    created_at      TEXT NOT NULL,
    last_activity   TEXT NOT NULL,
    ip              TEXT,
    user_agent      TEXT
);

CREATE INDEX idx_sessions_user_id ON sessions(user_id);
CREATE INDEX idx_sessions_last_activity ON sessions(last_activity);
"#,
    // v3: single-use CSRF tokens
    r#"
CREATE TABLE csrf_tokens (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    token_hash      TEXT NOT NULL UNIQUE,
    binding_hash    TEXT NOT NULL,                     -- hash of the session id it belongs to
    created_at      TEXT NOT NULL,
    expires_at      TEXT NOT NULL,
    used_at         TEXT
);

CREATE INDEX idx_csrf_tokens_expires_at ON csrf_tokens(expires_at);
"#,
    // v4: sliding-window rate limiting
    r#"
CREATE TABLE rate_limit_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    action          TEXT NOT NULL,
    identifier      TEXT NOT NULL,
    occurred_at     TEXT NOT NULL
);

CREATE INDEX idx_rate_limit_key ON rate_limit_events(action, identifier, occurred_at);
"#,
    // v5: categories
    r#"
CREATE TABLE categories (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE COLLATE NOCASE,
    slug            TEXT NOT NULL UNIQUE,
    description     TEXT,
    created_at      TEXT NOT NULL
);
"#,
    // v6: posts
    r#"
CREATE TABLE posts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id       INTEGER NOT NULL REFERENCES users(id),
    category_id     INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'published')),
    view_count      INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX idx_posts_status_created ON posts(status, created_at);
CREATE INDEX idx_posts_category_id ON posts(category_id);
"#,
    // v7: comments
    r#"
CREATE TABLE comments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id         INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    author_id       INTEGER NOT NULL REFERENCES users(id),
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_comments_post_id ON comments(post_id, created_at);
"#,
    // v8: deduplicated post views
    r#"
CREATE TABLE post_views (
    post_id         INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    viewer_hash     TEXT NOT NULL,
    viewed_at       TEXT NOT NULL,
    PRIMARY KEY (post_id, viewer_hash)
);
"#,
    // v9: audit log
    r#"
CREATE TABLE audit_log (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER REFERENCES users(id) ON DELETE SET NULL,
    event           TEXT NOT NULL,
    detail          TEXT,
    ip              TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX idx_audit_log_created_at ON audit_log(created_at);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_every_table_has_a_migration() {
        for table in [
            "users",
            "sessions",
            "csrf_tokens",
            "rate_limit_events",
            "categories",
            "posts",
            "comments",
            "post_views",
            "audit_log",
        ] {
            let needle = format!("CREATE TABLE {table} ");
            assert!(
                MIGRATIONS.iter().any(|m| m.contains(&needle)),
                "no migration creates {table}"
            );
        }
    }
}
