//! Password hashing for Quill.
//!
//! Uses Argon2id with the configured memory, time and parallelism costs.
//! Hashes are PHC strings, so verification reads the parameters a hash was
//! created with and keeps working after the configuration changes.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::Argon2Config;
use crate::QuillError;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Argon2 rejected the configured parameters.
    #[error("invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Password verification failed (wrong password).
    #[error("password verification failed")]
    VerificationFailed,
}

impl From<PasswordError> for QuillError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::VerificationFailed => QuillError::InvalidCredentials,
            PasswordError::InvalidParams(msg) => QuillError::Config(msg),
            other => QuillError::Crypto(other.to_string()),
        }
    }
}

/// Argon2id hasher configured from `[auth.argon2]`.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Hash of a random throwaway password, verified against when the user
    /// does not exist so that both paths cost the same.
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher. Fails if Argon2 rejects the parameters.
    pub fn new(config: &Argon2Config) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        let throwaway = SaltString::generate(&mut OsRng);
        hasher.dummy_hash = hasher.hash(throwaway.as_str())?;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password using Argon2id with a fresh random salt.
    ///
    /// # Examples
    ///
    /// ```
    /// use quill::auth::PasswordHasher;
    /// use quill::config::Argon2Config;
    ///
    /// let hasher = PasswordHasher::new(&Argon2Config {
    ///     memory_kib: 1024,
    ///     iterations: 1,
    ///     parallelism: 1,
    /// })
    /// .unwrap();
    /// let hash = hasher.hash("my_secure_password").unwrap();
    /// assert!(hash.starts_with("$argon2id$"));
    /// assert!(hasher.verify("my_secure_password", &hash).is_ok());
    /// ```
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored hash.
    ///
    /// The cost parameters are read from the hash itself.
    pub fn verify(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| PasswordError::VerificationFailed)
    }

    /// Burn one verification's worth of time. Always "fails".
    pub fn dummy_verify(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// [`hash`](Self::hash) on the blocking thread pool.
    pub async fn hash_async(&self, password: &str) -> Result<String, PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    /// [`verify`](Self::verify) on the blocking thread pool.
    pub async fn verify_async(&self, password: &str, hash: &str) -> Result<(), PasswordError> {
        let hasher = self.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    /// [`dummy_verify`](Self::dummy_verify) on the blocking thread pool.
    pub async fn dummy_verify_async(&self, password: &str) {
        let hasher = self.clone();
        let password = password.to_string();
        let _ = tokio::task::spawn_blocking(move || hasher.dummy_verify(&password)).await;
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .finish()
    }
}
