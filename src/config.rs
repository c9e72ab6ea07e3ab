//! Configuration module for Quill.

use serde::Deserialize;
use std::path::Path;

use crate::{QuillError, Result};

/// Upper bound for every `*_secs` duration setting: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/quill.db".to_string()
}

fn default_db_max_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_db_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/quill.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Argon2Config {
    /// Memory cost in KiB.
    #[serde(default = "default_argon2_memory")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
}

fn default_argon2_memory() -> u32 {
    65536 // 64 MiB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
        }
    }
}

/// Authentication and session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Sessions idle longer than this are rejected.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Sessions older than this are rejected regardless of activity.
    #[serde(default = "default_absolute_timeout")]
    pub absolute_timeout_secs: u64,
    /// Consecutive failed logins before the account is locked.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,
    /// Lockout duration in seconds.
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,
    /// New accounts start as `pending` until an admin activates them.
    #[serde(default)]
    pub require_activation: bool,
    /// Report `ACCOUNT_LOCKED` instead of `INVALID_CREDENTIALS` for locked accounts.
    #[serde(default)]
    pub reveal_lockout: bool,
    /// Password hashing cost.
    #[serde(default)]
    pub argon2: Argon2Config,
}

fn default_idle_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_absolute_timeout() -> u64 {
    43200 // 12 hours
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_secs() -> u64 {
    900 // 15 minutes
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            absolute_timeout_secs: default_absolute_timeout(),
            max_failed_attempts: default_max_failed_attempts(),
            lockout_secs: default_lockout_secs(),
            require_activation: false,
            reveal_lockout: false,
            argon2: Argon2Config::default(),
        }
    }
}

/// Password policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordPolicyConfig {
    /// Minimum length in characters.
    #[serde(default = "default_password_min")]
    pub min_length: usize,
    /// Maximum length in characters.
    #[serde(default = "default_password_max")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    #[serde(default = "default_true")]
    pub require_digit: bool,
    #[serde(default = "default_true")]
    pub require_symbol: bool,
    /// Reject passwords on the built-in common-password list.
    #[serde(default = "default_true")]
    pub reject_common: bool,
    /// Additional passwords to reject.
    #[serde(default)]
    pub extra_blocklist: Vec<String>,
}

fn default_password_min() -> usize {
    8
}

fn default_password_max() -> usize {
    128
}

fn default_true() -> bool {
    true
}

impl Default for PasswordPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: default_password_min(),
            max_length: default_password_max(),
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
            reject_common: true,
            extra_blocklist: Vec::new(),
        }
    }
}

/// CSRF token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfConfig {
    /// Token lifetime in seconds.
    #[serde(default = "default_csrf_ttl")]
    pub token_ttl_secs: u64,
}

fn default_csrf_ttl() -> u64 {
    3600
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_csrf_ttl(),
        }
    }
}

/// Sliding window for one rate-limited action.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct RateLimitRule {
    /// Actions allowed inside the window.
    pub max_actions: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitRule {
    pub const fn new(max_actions: u32, window_secs: u64) -> Self {
        Self {
            max_actions,
            window_secs,
        }
    }
}

/// Rate limits per action.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_login_limit")]
    pub login: RateLimitRule,
    #[serde(default = "default_register_limit")]
    pub register: RateLimitRule,
    #[serde(default = "default_comment_limit")]
    pub comment: RateLimitRule,
    #[serde(default = "default_post_limit")]
    pub post: RateLimitRule,
}

fn default_login_limit() -> RateLimitRule {
    RateLimitRule::new(10, 300) // 10 per 5 minutes
}

fn default_register_limit() -> RateLimitRule {
    RateLimitRule::new(5, 3600)
}

fn default_comment_limit() -> RateLimitRule {
    RateLimitRule::new(10, 60)
}

fn default_post_limit() -> RateLimitRule {
    RateLimitRule::new(20, 3600)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: default_login_limit(),
            register: default_register_limit(),
            comment: default_comment_limit(),
            post: default_post_limit(),
        }
    }
}

/// Web (HTTP) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Name of the session cookie.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// Mark the session cookie `Secure`. Disable only for local HTTP.
    #[serde(default = "default_true")]
    pub cookie_secure: bool,
    /// SameSite mode for the session cookie (`lax` or `strict`).
    #[serde(default = "default_same_site")]
    pub same_site: String,
    /// Read the client IP from `X-Forwarded-For` / `X-Real-IP`.
    #[serde(default)]
    pub trust_proxy_headers: bool,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_csp")]
    pub content_security_policy: String,
    #[serde(default = "default_hsts")]
    pub hsts: String,
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
}

fn default_session_cookie() -> String {
    "quill_session".to_string()
}

fn default_same_site() -> String {
    "lax".to_string()
}

fn default_csp() -> String {
    "default-src 'self'; script-src 'self'; style-src 'self'; frame-ancestors 'none'".to_string()
}

fn default_hsts() -> String {
    "max-age=31536000; includeSubDomains".to_string()
}

fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            session_cookie: default_session_cookie(),
            cookie_secure: true,
            same_site: default_same_site(),
            trust_proxy_headers: false,
            cors_origins: vec![],
            content_security_policy: default_csp(),
            hsts: default_hsts(),
            referrer_policy: default_referrer_policy(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Password policy.
    #[serde(default)]
    pub password_policy: PasswordPolicyConfig,
    /// CSRF configuration.
    #[serde(default)]
    pub csrf: CsrfConfig,
    /// Rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(QuillError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| QuillError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `QUILL_DATABASE_PATH`: Override the database path
    /// - `QUILL_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("QUILL_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("QUILL_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let auth = &self.auth;
        if auth.max_failed_attempts == 0 {
            return Err(invalid("auth.max_failed_attempts must be at least 1"));
        }
        if auth.lockout_secs == 0 {
            return Err(invalid("auth.lockout_secs must be positive"));
        }
        if auth.idle_timeout_secs == 0 {
            return Err(invalid("auth.idle_timeout_secs must be positive"));
        }
        if auth.absolute_timeout_secs < auth.idle_timeout_secs {
            return Err(invalid(
                "auth.absolute_timeout_secs must not be shorter than auth.idle_timeout_secs",
            ));
        }
        argon2::Params::new(
            auth.argon2.memory_kib,
            auth.argon2.iterations,
            auth.argon2.parallelism,
            None,
        )
        .map_err(|e| QuillError::Config(format!("invalid auth.argon2 parameters: {e}")))?;

        let policy = &self.password_policy;
        if policy.min_length == 0 || policy.min_length > policy.max_length {
            return Err(invalid(
                "password_policy.min_length must be between 1 and max_length",
            ));
        }

        if self.csrf.token_ttl_secs == 0 {
            return Err(invalid("csrf.token_ttl_secs must be positive"));
        }

        for (name, rule) in [
            ("login", &self.rate_limit.login),
            ("register", &self.rate_limit.register),
            ("comment", &self.rate_limit.comment),
            ("post", &self.rate_limit.post),
        ] {
            if rule.max_actions == 0 || rule.window_secs == 0 {
                return Err(QuillError::Config(format!(
                    "rate_limit.{name} needs positive max_actions and window_secs"
                )));
            }
        }

        for (name, value) in [
            ("auth.lockout_secs", auth.lockout_secs),
            ("auth.idle_timeout_secs", auth.idle_timeout_secs),
            ("auth.absolute_timeout_secs", auth.absolute_timeout_secs),
            ("csrf.token_ttl_secs", self.csrf.token_ttl_secs),
            ("rate_limit.login.window_secs", self.rate_limit.login.window_secs),
            ("rate_limit.register.window_secs", self.rate_limit.register.window_secs),
            ("rate_limit.comment.window_secs", self.rate_limit.comment.window_secs),
            ("rate_limit.post.window_secs", self.rate_limit.post.window_secs),
        ] {
            if value > MAX_DURATION_SECS {
                return Err(QuillError::Config(format!(
                    "{name} must be at most {MAX_DURATION_SECS} seconds (10 years), got {value}"
                )));
            }
        }

        if !matches!(self.web.same_site.to_lowercase().as_str(), "lax" | "strict") {
            return Err(QuillError::Config(format!(
                "web.same_site must be \"lax\" or \"strict\", got {:?}",
                self.web.same_site
            )));
        }
        if self.web.session_cookie.is_empty() {
            return Err(invalid("web.session_cookie must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> QuillError {
    QuillError::Config(msg.to_string())
}
