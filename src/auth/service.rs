//! Authentication service: registration, login, logout, session validation
//! and account administration.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::clock::{hash_token, Clock, RandomSource};
use super::password::{PasswordError, PasswordHasher};
use super::permission::{require, Capability};
use super::rate_limit::{Action, RateLimiter};
use super::validation::{CredentialValidator, PasswordPolicy};
use crate::config::{AuthConfig, Config};
use crate::datetime::{add_secs, from_db, sub_secs, to_db};
use crate::db::{
    AccountStatus, AuditEvent, AuditRepository, Database, NewAuditEvent, NewSession, NewUser,
    Role, SessionRecord, SessionRepository, User, UserRepository,
};
use crate::{QuillError, Result};

/// Where a request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client IP, or `"unknown"`.
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// New session identifier for the client cookie. Never stored raw.
    pub session_id: String,
}

/// A validated session and its owner.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
    pub record: SessionRecord,
}

/// Outcome of looking up a presented session identifier.
#[derive(Debug, Clone)]
pub enum SessionLookup {
    Active(AuthenticatedSession),
    /// A session existed but has timed out or lost its user; it is now gone.
    Expired,
    /// Anonymous identifier, or a session removed earlier.
    Unknown,
}

/// The authentication core.
///
/// Holds its collaborators explicitly; tests swap the clock for a
/// [`ManualClock`](super::ManualClock).
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    clock: Arc<dyn Clock>,
    rng: Arc<dyn RandomSource>,
    hasher: PasswordHasher,
    validator: CredentialValidator,
    limiter: RateLimiter,
    config: AuthConfig,
}

impl AuthService {
    /// Build the service from configuration.
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        rng: Arc<dyn RandomSource>,
        config: &Config,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.auth.argon2)?;
        let validator =
            CredentialValidator::new(PasswordPolicy::from_config(&config.password_policy));
        let limiter = RateLimiter::new(db.clone(), clock.clone(), config.rate_limit.clone());

        Ok(Self {
            db,
            clock,
            rng,
            hasher,
            validator,
            limiter,
            config: config.auth.clone(),
        })
    }

    /// The rate limiter shared with the rest of the application.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The credential validator in force.
    pub fn validator(&self) -> &CredentialValidator {
        &self.validator
    }

    fn now(&self) -> String {
        to_db(&self.clock.now())
    }

    async fn audit(&self, event: NewAuditEvent) -> Result<()> {
        AuditRepository::new(self.db.pool())
            .record(&event, &self.now())
            .await?;
        Ok(())
    }

    /// A fresh identifier for an anonymous client.
    pub fn new_session_id(&self) -> String {
        self.rng.token()
    }

    /// Register a new account.
    ///
    /// The very first account becomes an active admin.
    pub async fn register(&self, req: &RegistrationRequest, client: &ClientInfo) -> Result<User> {
        self.limiter
            .check_and_record(Action::Register, &client.ip)
            .await?;
        self.validator
            .validate_registration(&req.username, &req.email, &req.password)?;

        let repo = UserRepository::new(self.db.pool());
        if repo.identity_taken(&req.username, &req.email).await? {
            warn!(username = %req.username, "Registration rejected: identity taken");
            return Err(QuillError::DuplicateIdentity);
        }

        let password_hash = self.hasher.hash_async(&req.password).await?;
        let status = if self.config.require_activation {
            AccountStatus::Pending
        } else {
            AccountStatus::Active
        };
        let new_user = NewUser::new(req.username.trim(), req.email.trim(), password_hash)
            .with_status(status);

        // UNIQUE constraints still catch a concurrent registration
        let user = repo.create_promoting_first(&new_user, &self.now()).await?;

        self.audit(
            NewAuditEvent::new("user_registered")
                .user(user.id)
                .detail(format!("role={} status={}", user.role, user.status))
                .ip(&client.ip),
        )
        .await?;

        info!(
            user_id = user.id,
            username = %user.username,
            role = %user.role,
            status = %user.status,
            "User registered"
        );
        Ok(user)
    }

    /// Authenticate and open a new session.
    ///
    /// `previous_session` is the identifier the client presented before
    /// logging in; its record is dropped and a new identifier issued.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
        previous_session: Option<&str>,
    ) -> Result<LoginOutcome> {
        self.limiter
            .check_and_record(Action::Login, &client.ip)
            .await?;
        self.validator.validate_login(identifier, password)?;

        let repo = UserRepository::new(self.db.pool());
        let user = match repo.get_by_identifier(identifier.trim()).await? {
            Some(user) => user,
            None => {
                self.hasher.dummy_verify_async(password).await;
                warn!(ip = %client.ip, "Login failed: unknown identifier");
                self.audit(
                    NewAuditEvent::new("login_failed")
                        .detail("unknown identifier")
                        .ip(&client.ip),
                )
                .await?;
                return Err(QuillError::InvalidCredentials);
            }
        };

        let now = self.clock.now();
        let now_str = to_db(&now);

        if user.is_locked_at(&now_str) {
            self.hasher.dummy_verify_async(password).await;
            let retry_after_secs = user
                .locked_until
                .as_deref()
                .and_then(from_db)
                .map(|until| (until - now).num_seconds().max(1) as u64)
                .unwrap_or(self.config.lockout_secs);
            warn!(
                user_id = user.id,
                retry_after_secs,
                "Login attempt blocked: account locked"
            );
            self.audit(
                NewAuditEvent::new("login_failed")
                    .user(user.id)
                    .detail("account locked")
                    .ip(&client.ip),
            )
            .await?;
            return Err(if self.config.reveal_lockout {
                QuillError::AccountLocked { retry_after_secs }
            } else {
                QuillError::InvalidCredentials
            });
        }

        match self.hasher.verify_async(password, &user.password_hash).await {
            Ok(()) => {}
            Err(PasswordError::VerificationFailed) => {
                return Err(self.record_failure(&user, client).await?);
            }
            Err(e) => return Err(e.into()),
        }

        if !user.is_active() {
            warn!(user_id = user.id, status = %user.status, "Login failed: account not active");
            self.audit(
                NewAuditEvent::new("login_failed")
                    .user(user.id)
                    .detail(format!("status={}", user.status))
                    .ip(&client.ip),
            )
            .await?;
            return Err(QuillError::InvalidCredentials);
        }

        repo.record_successful_login(user.id, &now_str).await?;
        self.limiter.clear(Action::Login, &client.ip).await?;

        let sessions = SessionRepository::new(self.db.pool());
        if let Some(previous) = previous_session {
            sessions.delete_by_hash(&hash_token(previous)).await?;
        }

        let session_id = self.rng.token();
        sessions
            .create(
                &NewSession {
                    id_hash: hash_token(&session_id),
                    user_id: user.id,
                    ip: Some(client.ip.clone()),
                    user_agent: client.user_agent.clone(),
                },
                &now_str,
            )
            .await?;

        self.audit(NewAuditEvent::new("login_succeeded").user(user.id).ip(&client.ip))
            .await?;
        info!(user_id = user.id, username = %user.username, "Login successful");

        let user = repo
            .get_by_id(user.id)
            .await?
            .ok_or(QuillError::InvalidCredentials)?;
        Ok(LoginOutcome { user, session_id })
    }

    /// Count a wrong password, locking the account at the threshold.
    ///
    /// Returns the error the caller should report.
    async fn record_failure(&self, user: &User, client: &ClientInfo) -> Result<QuillError> {
        let now = self.clock.now();
        let lock_until = to_db(&add_secs(now, self.config.lockout_secs)?);

        let outcome = UserRepository::new(self.db.pool())
            .record_failed_login(
                user.id,
                self.config.max_failed_attempts,
                &lock_until,
                &to_db(&now),
            )
            .await?;

        self.audit(
            NewAuditEvent::new("login_failed")
                .user(user.id)
                .detail("wrong password")
                .ip(&client.ip),
        )
        .await?;

        match outcome {
            Some(failed) if failed.locked_now => {
                warn!(
                    user_id = user.id,
                    lockout_secs = self.config.lockout_secs,
                    "Account locked after repeated failures"
                );
                self.audit(
                    NewAuditEvent::new("account_locked")
                        .user(user.id)
                        .detail(format!("until {lock_until}"))
                        .ip(&client.ip),
                )
                .await?;
            }
            Some(failed) => {
                warn!(
                    user_id = user.id,
                    failed_attempts = failed.failed_attempts,
                    "Login failed: wrong password"
                );
            }
            None => {}
        }

        Ok(QuillError::InvalidCredentials)
    }

    /// End a session. Returns a fresh anonymous identifier for the client.
    pub async fn logout(&self, session_id: Option<&str>, client: &ClientInfo) -> Result<String> {
        if let Some(session_id) = session_id {
            let sessions = SessionRepository::new(self.db.pool());
            let id_hash = hash_token(session_id);
            if let Some(record) = sessions.get_by_hash(&id_hash).await? {
                sessions.delete_by_hash(&id_hash).await?;
                self.audit(NewAuditEvent::new("logout").user(record.user_id).ip(&client.ip))
                    .await?;
                info!(user_id = record.user_id, "Session logged out");
            } else {
                debug!("Logout: session not found");
            }
        }
        Ok(self.rng.token())
    }

    /// Validate a presented session identifier and refresh its activity.
    ///
    /// Idle, too old, or orphaned records are deleted and reported as
    /// `SessionExpired`, as are identifiers with no session at all.
    pub async fn validate_session(&self, session_id: &str) -> Result<AuthenticatedSession> {
        match self.lookup_session(session_id).await? {
            SessionLookup::Active(session) => Ok(session),
            SessionLookup::Expired | SessionLookup::Unknown => Err(QuillError::SessionExpired),
        }
    }

    /// Like [`validate_session`](Self::validate_session), but tells a session
    /// that just ended apart from an identifier that never had one.
    pub async fn lookup_session(&self, session_id: &str) -> Result<SessionLookup> {
        if session_id.is_empty() {
            return Ok(SessionLookup::Unknown);
        }

        let now = self.clock.now();
        let idle_cutoff = to_db(&sub_secs(now, self.config.idle_timeout_secs)?);
        let absolute_cutoff = to_db(&sub_secs(now, self.config.absolute_timeout_secs)?);
        let id_hash = hash_token(session_id);
        let sessions = SessionRepository::new(self.db.pool());

        let record = sessions
            .touch_if_valid(&id_hash, &idle_cutoff, &absolute_cutoff, &to_db(&now))
            .await?;

        let Some(record) = record else {
            if sessions.delete_by_hash(&id_hash).await? {
                debug!("Removed stale session");
                return Ok(SessionLookup::Expired);
            }
            return Ok(SessionLookup::Unknown);
        };

        match UserRepository::new(self.db.pool())
            .get_by_id(record.user_id)
            .await?
        {
            Some(user) if user.is_active() => {
                Ok(SessionLookup::Active(AuthenticatedSession { user, record }))
            }
            _ => {
                sessions.delete_by_hash(&id_hash).await?;
                Ok(SessionLookup::Expired)
            }
        }
    }

    /// Change a user's password after verifying the current one.
    pub async fn change_password(
        &self,
        user_id: i64,
        current: &str,
        new: &str,
        client: &ClientInfo,
    ) -> Result<()> {
        let repo = UserRepository::new(self.db.pool());
        let user = repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| QuillError::NotFound("user".to_string()))?;

        match self.hasher.verify_async(current, &user.password_hash).await {
            Ok(()) => {}
            Err(PasswordError::VerificationFailed) => {
                warn!(user_id, "Password change rejected: wrong current password");
                return Err(QuillError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        }

        self.validator.validate_new_password(&user.username, new)?;

        let password_hash = self.hasher.hash_async(new).await?;
        repo.update_password(user_id, &password_hash, &self.now())
            .await?;

        self.audit(NewAuditEvent::new("password_changed").user(user_id).ip(&client.ip))
            .await?;
        info!(user_id, "Password changed");
        Ok(())
    }

    /// Look a user up by id.
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        UserRepository::new(self.db.pool())
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| QuillError::NotFound("user".to_string()))
    }

    /// Change another user's role. Admin only.
    pub async fn set_role(&self, actor: &User, user_id: i64, role: Role) -> Result<User> {
        require(Some(actor), Capability::ManageUsers)?;
        if actor.id == user_id {
            return Err(QuillError::Forbidden);
        }

        let user = UserRepository::new(self.db.pool())
            .set_role(user_id, role, &self.now())
            .await?
            .ok_or_else(|| QuillError::NotFound("user".to_string()))?;

        self.audit(
            NewAuditEvent::new("role_changed")
                .user(actor.id)
                .detail(format!("user_id={user_id} role={role}")),
        )
        .await?;
        info!(actor_id = actor.id, user_id, role = %role, "Role changed");
        Ok(user)
    }

    /// Change another user's account status. Admin only.
    ///
    /// Leaving `active` removes all of the user's sessions.
    pub async fn set_status(
        &self,
        actor: &User,
        user_id: i64,
        status: AccountStatus,
    ) -> Result<User> {
        require(Some(actor), Capability::ManageUsers)?;
        if actor.id == user_id {
            return Err(QuillError::Forbidden);
        }

        let user = UserRepository::new(self.db.pool())
            .set_status(user_id, status, &self.now())
            .await?
            .ok_or_else(|| QuillError::NotFound("user".to_string()))?;

        self.audit(
            NewAuditEvent::new("status_changed")
                .user(actor.id)
                .detail(format!("user_id={user_id} status={status}")),
        )
        .await?;
        info!(actor_id = actor.id, user_id, status = %status, "Account status changed");
        Ok(user)
    }

    /// Page through the audit log. Admin only.
    pub async fn list_audit(
        &self,
        actor: &User,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<AuditEvent>, i64)> {
        require(Some(actor), Capability::ReadAudit)?;
        let repo = AuditRepository::new(self.db.pool());
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);
        let events = repo.list(i64::from(per_page), offset).await?;
        let total = repo.count().await?;
        Ok((events, total))
    }

    /// Delete sessions past their idle or absolute timeout.
    pub async fn cleanup_sessions(&self) -> Result<u64> {
        let now = self.clock.now();
        let removed = SessionRepository::new(self.db.pool())
            .cleanup(
                &to_db(&sub_secs(now, self.config.idle_timeout_secs)?),
                &to_db(&sub_secs(now, self.config.absolute_timeout_secs)?),
            )
            .await?;
        if removed > 0 {
            debug!(removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ManualClock, OsRandom, Rule};
    use crate::config::Argon2Config;
    use chrono::{Duration, TimeZone, Utc};

    const STRONG: &str = "Str0ng!Pass";

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.argon2 = Argon2Config {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    async fn setup_with(config: Config) -> (AuthService, Arc<ManualClock>, Database) {
        let db = Database::open_in_memory().await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let service =
            AuthService::new(db.clone(), clock.clone(), Arc::new(OsRandom), &config).unwrap();
        (service, clock, db)
    }

    async fn setup() -> (AuthService, Arc<ManualClock>, Database) {
        setup_with(test_config()).await
    }

    fn client() -> ClientInfo {
        ClientInfo::new("192.0.2.1").with_user_agent("test")
    }

    async fn register(service: &AuthService, name: &str) -> User {
        service
            .register(
                &RegistrationRequest::new(name, format!("{name}@example.com"), STRONG),
                &client(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let (service, _clock, _db) = setup().await;
        let first = register(&service, "root").await;
        let second = register(&service, "alice").await;
        assert_eq!(first.role, Role::Admin);
        assert_eq!(second.role, Role::User);
        assert_eq!(second.status, AccountStatus::Active);
        assert!(second.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_reports_every_policy_violation() {
        let (service, _clock, _db) = setup().await;
        let err = service
            .register(
                &RegistrationRequest::new("alice", "alice@example.com", "password"),
                &client(),
            )
            .await
            .unwrap_err();

        match err {
            QuillError::ValidationFailed(v) => {
                let rules: Vec<_> = v.iter().map(|x| x.rule).collect();
                assert!(rules.contains(&Rule::MissingUppercase));
                assert!(rules.contains(&Rule::MissingDigit));
                assert!(rules.contains(&Rule::MissingSymbol));
                assert!(rules.contains(&Rule::CommonPassword));
            }
            other => panic!("Expected ValidationFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_identity() {
        let (service, _clock, _db) = setup().await;
        register(&service, "alice").await;

        let same_name = service
            .register(
                &RegistrationRequest::new("ALICE", "other@example.com", STRONG),
                &client(),
            )
            .await;
        assert!(matches!(same_name, Err(QuillError::DuplicateIdentity)));

        let same_email = service
            .register(
                &RegistrationRequest::new("bob", "Alice@Example.com", STRONG),
                &client(),
            )
            .await;
        assert!(matches!(same_email, Err(QuillError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn test_register_pending_when_activation_required() {
        let mut config = test_config();
        config.auth.require_activation = true;
        let (service, _clock, _db) = setup_with(config).await;

        register(&service, "root").await;
        let alice = register(&service, "alice").await;
        assert_eq!(alice.status, AccountStatus::Pending);

        let err = service
            .login("alice", STRONG, &client(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_by_username_or_email() {
        let (service, _clock, _db) = setup().await;
        register(&service, "alice").await;

        let by_name = service.login("alice", STRONG, &client(), None).await.unwrap();
        let by_email = service
            .login("ALICE@example.com", STRONG, &client(), None)
            .await
            .unwrap();
        assert_eq!(by_name.user.username, "alice");
        assert!(by_name.user.last_login.is_some());
        assert_ne!(by_name.session_id, by_email.session_id);
    }

    #[tokio::test]
    async fn test_login_unknown_user() {
        let (service, _clock, _db) = setup().await;
        let err = service
            .login("ghost", STRONG, &client(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_login_regenerates_session() {
        let (service, _clock, _db) = setup().await;
        register(&service, "alice").await;

        let first = service.login("alice", STRONG, &client(), None).await.unwrap();
        let second = service
            .login("alice", STRONG, &client(), Some(&first.session_id))
            .await
            .unwrap();

        assert!(matches!(
            service.validate_session(&first.session_id).await,
            Err(QuillError::SessionExpired)
        ));
        service.validate_session(&second.session_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_lockout_after_threshold() {
        let (service, clock, _db) = setup().await;
        register(&service, "alice").await;

        for _ in 0..5 {
            let err = service
                .login("alice", "Wr0ng!Pass", &client(), None)
                .await
                .unwrap_err();
            assert!(matches!(err, QuillError::InvalidCredentials));
        }

        // correct password during lockout still fails
        let err = service
            .login("alice", STRONG, &client(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::InvalidCredentials));

        clock.advance(Duration::seconds(901));
        service.login("alice", STRONG, &client(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_range_durations_fail_without_panicking() {
        let mut config = test_config();
        config.auth.lockout_secs = 100_000_000_000_000;
        config.auth.idle_timeout_secs = u64::MAX;
        config.auth.absolute_timeout_secs = u64::MAX;
        let (service, _clock, _db) = setup_with(config).await;
        register(&service, "alice").await;

        let err = service
            .login("alice", "Wr0ng!Pass", &client(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Config(_)));

        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();
        let err = service
            .validate_session(&outcome.session_id)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[tokio::test]
    async fn test_reveal_lockout() {
        let mut config = test_config();
        config.auth.reveal_lockout = true;
        config.auth.max_failed_attempts = 2;
        config.auth.lockout_secs = 60;
        let (service, clock, _db) = setup_with(config).await;
        register(&service, "alice").await;

        for _ in 0..2 {
            let _ = service.login("alice", "Wr0ng!Pass", &client(), None).await;
        }
        clock.advance(Duration::seconds(15));
        match service.login("alice", STRONG, &client(), None).await {
            Err(QuillError::AccountLocked { retry_after_secs }) => {
                assert_eq!(retry_after_secs, 45)
            }
            other => panic!("Expected AccountLocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_rate_limited_per_ip() {
        let mut config = test_config();
        config.rate_limit.login = crate::config::RateLimitRule::new(2, 60);
        let (service, _clock, _db) = setup_with(config).await;

        for _ in 0..2 {
            let _ = service.login("ghost", STRONG, &client(), None).await;
        }
        let err = service
            .login("ghost", STRONG, &client(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::RateLimited { .. }));

        // other clients are unaffected
        let err = service
            .login("ghost", STRONG, &ClientInfo::new("198.51.100.9"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_successful_login_clears_rate_limit() {
        let mut config = test_config();
        config.rate_limit.login = crate::config::RateLimitRule::new(2, 60);
        let (service, _clock, _db) = setup_with(config).await;
        register(&service, "alice").await;

        let _ = service.login("alice", "Wr0ng!Pass", &client(), None).await;
        service.login("alice", STRONG, &client(), None).await.unwrap();
        assert_eq!(
            service
                .limiter()
                .current_count(Action::Login, &client().ip)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_session_idle_timeout() {
        let (service, clock, _db) = setup().await;
        register(&service, "alice").await;
        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();

        clock.advance(Duration::seconds(1700));
        service.validate_session(&outcome.session_id).await.unwrap();

        // activity was refreshed, so another 1700s is still fine
        clock.advance(Duration::seconds(1700));
        service.validate_session(&outcome.session_id).await.unwrap();

        clock.advance(Duration::seconds(1801));
        assert!(matches!(
            service.validate_session(&outcome.session_id).await,
            Err(QuillError::SessionExpired)
        ));
        // the stale record is gone for good
        clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        assert!(service.validate_session(&outcome.session_id).await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_distinguishes_expired_from_unknown() {
        let (service, clock, _db) = setup().await;
        register(&service, "alice").await;
        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();

        assert!(matches!(
            service.lookup_session(&outcome.session_id).await.unwrap(),
            SessionLookup::Active(_)
        ));
        assert!(matches!(
            service.lookup_session("anonymous-id").await.unwrap(),
            SessionLookup::Unknown
        ));

        clock.advance(Duration::seconds(1801));
        assert!(matches!(
            service.lookup_session(&outcome.session_id).await.unwrap(),
            SessionLookup::Expired
        ));
        // reported once, then indistinguishable from an anonymous id
        assert!(matches!(
            service.lookup_session(&outcome.session_id).await.unwrap(),
            SessionLookup::Unknown
        ));
    }

    #[tokio::test]
    async fn test_session_absolute_timeout() {
        let mut config = test_config();
        config.auth.idle_timeout_secs = 600;
        config.auth.absolute_timeout_secs = 1000;
        let (service, clock, _db) = setup_with(config).await;
        register(&service, "alice").await;
        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();

        clock.advance(Duration::seconds(500));
        service.validate_session(&outcome.session_id).await.unwrap();
        clock.advance(Duration::seconds(501));
        assert!(service.validate_session(&outcome.session_id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let (service, _clock, _db) = setup().await;
        assert!(matches!(
            service.validate_session("forged").await,
            Err(QuillError::SessionExpired)
        ));
        assert!(service.validate_session("").await.is_err());
    }

    #[tokio::test]
    async fn test_logout() {
        let (service, _clock, _db) = setup().await;
        register(&service, "alice").await;
        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();

        let fresh = service
            .logout(Some(&outcome.session_id), &client())
            .await
            .unwrap();
        assert_ne!(fresh, outcome.session_id);
        assert!(service.validate_session(&outcome.session_id).await.is_err());

        // logging out without a session still hands back an identifier
        assert!(!service.logout(None, &client()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_round_trip() {
        let (service, _clock, _db) = setup().await;
        let alice = register(&service, "alice").await;

        let err = service
            .change_password(alice.id, "Wr0ng!Pass", "N3w!Passw0rd", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::InvalidCredentials));

        let err = service
            .change_password(alice.id, STRONG, "weak", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::ValidationFailed(_)));

        service
            .change_password(alice.id, STRONG, "N3w!Passw0rd", &client())
            .await
            .unwrap();

        service
            .login("alice", "N3w!Passw0rd", &client(), None)
            .await
            .unwrap();
        assert!(matches!(
            service.login("alice", STRONG, &client(), None).await,
            Err(QuillError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_set_role_requires_admin() {
        let (service, _clock, _db) = setup().await;
        let admin = register(&service, "root").await;
        let alice = register(&service, "alice").await;
        let bob = register(&service, "bob").await;

        assert!(matches!(
            service.set_role(&alice, bob.id, Role::Admin).await,
            Err(QuillError::Forbidden)
        ));

        let promoted = service.set_role(&admin, alice.id, Role::Editor).await.unwrap();
        assert_eq!(promoted.role, Role::Editor);

        assert!(matches!(
            service.set_role(&admin, admin.id, Role::User).await,
            Err(QuillError::Forbidden)
        ));
        assert!(matches!(
            service.set_role(&admin, 999, Role::User).await,
            Err(QuillError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivation_ends_sessions() {
        let (service, _clock, _db) = setup().await;
        let admin = register(&service, "root").await;
        let alice = register(&service, "alice").await;
        let outcome = service.login("alice", STRONG, &client(), None).await.unwrap();

        service
            .set_status(&admin, alice.id, AccountStatus::Inactive)
            .await
            .unwrap();
        assert!(matches!(
            service.validate_session(&outcome.session_id).await,
            Err(QuillError::SessionExpired)
        ));
        assert!(service.login("alice", STRONG, &client(), None).await.is_err());

        service
            .set_status(&admin, alice.id, AccountStatus::Active)
            .await
            .unwrap();
        service.login("alice", STRONG, &client(), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_audit_trail() {
        let (service, _clock, _db) = setup().await;
        let admin = register(&service, "root").await;
        register(&service, "alice").await;
        let _ = service.login("alice", "Wr0ng!Pass", &client(), None).await;
        service.login("alice", STRONG, &client(), None).await.unwrap();

        let (events, total) = service.list_audit(&admin, 1, 50).await.unwrap();
        assert_eq!(total as usize, events.len());
        let names: Vec<_> = events.iter().map(|e| e.event.as_str()).collect();
        assert!(names.contains(&"user_registered"));
        assert!(names.contains(&"login_failed"));
        assert!(names.contains(&"login_succeeded"));

        let alice = service.get_user(2).await.unwrap();
        assert!(matches!(
            service.list_audit(&alice, 1, 50).await,
            Err(QuillError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_cleanup_sessions() {
        let (service, clock, db) = setup().await;
        register(&service, "alice").await;
        service.login("alice", STRONG, &client(), None).await.unwrap();

        assert_eq!(service.cleanup_sessions().await.unwrap(), 0);
        clock.advance(Duration::seconds(1801));
        assert_eq!(service.cleanup_sessions().await.unwrap(), 1);

        let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(left, 0);
    }
}
