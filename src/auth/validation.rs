//! Credential validation for Quill.
//!
//! Registration, login and password-change input is checked here before any
//! database access. Validation never stops at the first problem: callers get
//! every failing rule at once as a list of [`Violation`]s.

use std::fmt;

use validator::ValidateEmail;

use crate::config::PasswordPolicyConfig;
use crate::{QuillError, Result};

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Upper bound on anything accepted as a login identifier.
pub const MAX_IDENTIFIER_LENGTH: usize = MAX_EMAIL_LENGTH;

/// A single validation rule that input can break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Field is empty.
    Required,
    /// Field is shorter than allowed.
    TooShort {
        /// Minimum length in characters.
        min: usize,
    },
    /// Field is longer than allowed.
    TooLong {
        /// Maximum length in characters.
        max: usize,
    },
    /// Username contains characters other than ASCII letters, digits, `_`.
    InvalidCharacters,
    /// Email does not parse as an address.
    InvalidEmail,
    /// Password has no lowercase letter.
    MissingLowercase,
    /// Password has no uppercase letter.
    MissingUppercase,
    /// Password has no digit.
    MissingDigit,
    /// Password has no symbol.
    MissingSymbol,
    /// Password is on the common-password blocklist.
    CommonPassword,
    /// Password equals the username.
    SameAsUsername,
    /// Field refers to a row that does not exist.
    UnknownReference,
    /// Text contains control characters.
    ControlCharacters,
}

impl Rule {
    /// Stable machine-readable code for the rule.
    pub fn code(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::TooShort { .. } => "too_short",
            Rule::TooLong { .. } => "too_long",
            Rule::InvalidCharacters => "invalid_characters",
            Rule::InvalidEmail => "invalid_email",
            Rule::MissingLowercase => "missing_lowercase",
            Rule::MissingUppercase => "missing_uppercase",
            Rule::MissingDigit => "missing_digit",
            Rule::MissingSymbol => "missing_symbol",
            Rule::CommonPassword => "common_password",
            Rule::SameAsUsername => "same_as_username",
            Rule::UnknownReference => "unknown_reference",
            Rule::ControlCharacters => "control_characters",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "is required"),
            Rule::TooShort { min } => write!(f, "must be at least {min} characters"),
            Rule::TooLong { max } => write!(f, "must be at most {max} characters"),
            Rule::InvalidCharacters => {
                write!(f, "can only contain letters, digits and underscores")
            }
            Rule::InvalidEmail => write!(f, "is not a valid email address"),
            Rule::MissingLowercase => write!(f, "must contain a lowercase letter"),
            Rule::MissingUppercase => write!(f, "must contain an uppercase letter"),
            Rule::MissingDigit => write!(f, "must contain a digit"),
            Rule::MissingSymbol => write!(f, "must contain a symbol"),
            Rule::CommonPassword => write!(f, "is too common"),
            Rule::SameAsUsername => write!(f, "cannot be the same as the username"),
            Rule::UnknownReference => write!(f, "refers to an unknown record"),
            Rule::ControlCharacters => write!(f, "must not contain control characters"),
        }
    }
}

/// A broken rule on a named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Input field name (`username`, `email`, `password`, ...).
    pub field: &'static str,
    /// The rule that failed.
    pub rule: Rule,
}

impl Violation {
    /// Create a new violation.
    pub fn new(field: &'static str, rule: Rule) -> Self {
        Self { field, rule }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.rule)
    }
}

/// Frequently used passwords rejected regardless of policy flags.
const COMMON_PASSWORDS: &[&str] = &[
    "123456",
    "12345678",
    "123456789",
    "1234567890",
    "password",
    "password1",
    "password123",
    "passw0rd",
    "p@ssw0rd",
    "p@ssword1",
    "qwerty",
    "qwerty123",
    "qwertyuiop",
    "abc123",
    "abcd1234",
    "111111",
    "000000",
    "iloveyou",
    "letmein",
    "letmein1",
    "welcome",
    "welcome1",
    "welcome123",
    "admin",
    "admin123",
    "administrator",
    "monkey",
    "dragon",
    "football",
    "baseball",
    "sunshine",
    "princess",
    "trustno1",
    "master",
    "shadow",
    "superman",
    "changeme",
    "secret",
    "login",
    "starwars",
];

/// Password policy applied at registration and password change.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Maximum length in characters.
    pub max_length: usize,
    /// Require at least one lowercase letter.
    pub require_lowercase: bool,
    /// Require at least one uppercase letter.
    pub require_uppercase: bool,
    /// Require at least one digit.
    pub require_digit: bool,
    /// Require at least one non-alphanumeric character.
    pub require_symbol: bool,
    /// Reject passwords on the blocklist.
    pub reject_common: bool,
    /// Extra blocklisted passwords (lowercased).
    blocklist: Vec<String>,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::from_config(&PasswordPolicyConfig::default())
    }
}

impl PasswordPolicy {
    /// Build a policy from configuration.
    pub fn from_config(config: &PasswordPolicyConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            require_lowercase: config.require_lowercase,
            require_uppercase: config.require_uppercase,
            require_digit: config.require_digit,
            require_symbol: config.require_symbol,
            reject_common: config.reject_common,
            blocklist: config
                .extra_blocklist
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    /// Check whether a password is blocklisted (case-insensitive).
    pub fn is_common(&self, password: &str) -> bool {
        let lower = password.to_lowercase();
        COMMON_PASSWORDS.iter().any(|&p| p == lower) || self.blocklist.iter().any(|p| *p == lower)
    }

    /// Collect every rule the password breaks.
    ///
    /// `username` enables the same-as-username check.
    pub fn check(&self, password: &str, username: Option<&str>) -> Vec<Violation> {
        let mut violations = Vec::new();
        let push = |v: &mut Vec<Violation>, rule| v.push(Violation::new("password", rule));

        if password.is_empty() {
            push(&mut violations, Rule::Required);
            return violations;
        }

        let length = password.chars().count();
        if length < self.min_length {
            push(&mut violations, Rule::TooShort {
                min: self.min_length,
            });
        }
        if length > self.max_length {
            push(&mut violations, Rule::TooLong {
                max: self.max_length,
            });
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            push(&mut violations, Rule::MissingLowercase);
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            push(&mut violations, Rule::MissingUppercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            push(&mut violations, Rule::MissingDigit);
        }
        if self.require_symbol
            && !password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
        {
            push(&mut violations, Rule::MissingSymbol);
        }
        if self.reject_common && self.is_common(password) {
            push(&mut violations, Rule::CommonPassword);
        }
        if let Some(user) = username {
            if password.eq_ignore_ascii_case(user) {
                push(&mut violations, Rule::SameAsUsername);
            }
        }

        violations
    }
}

/// Validate a username.
///
/// Requirements:
/// - Length: 3-50 characters
/// - Characters: ASCII letters, digits and underscore
///
/// # Examples
///
/// ```
/// use quill::auth::validation::check_username;
///
/// assert!(check_username("john_doe").is_empty());
/// assert!(!check_username("ab").is_empty());
/// assert!(!check_username("john-doe").is_empty());
/// ```
pub fn check_username(username: &str) -> Vec<Violation> {
    let mut violations = Vec::new();

    if username.is_empty() {
        violations.push(Violation::new("username", Rule::Required));
        return violations;
    }

    let length = username.chars().count();
    if length < MIN_USERNAME_LENGTH {
        violations.push(Violation::new(
            "username",
            Rule::TooShort {
                min: MIN_USERNAME_LENGTH,
            },
        ));
    }
    if length > MAX_USERNAME_LENGTH {
        violations.push(Violation::new(
            "username",
            Rule::TooLong {
                max: MAX_USERNAME_LENGTH,
            },
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        violations.push(Violation::new("username", Rule::InvalidCharacters));
    }

    violations
}

/// Validate an email address.
///
/// # Examples
///
/// ```
/// use quill::auth::validation::check_email;
///
/// assert!(check_email("user@example.com").is_empty());
/// assert!(!check_email("invalid").is_empty());
/// ```
pub fn check_email(email: &str) -> Vec<Violation> {
    if email.is_empty() {
        return vec![Violation::new("email", Rule::Required)];
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return vec![Violation::new(
            "email",
            Rule::TooLong {
                max: MAX_EMAIL_LENGTH,
            },
        )];
    }
    if !email.validate_email() {
        return vec![Violation::new("email", Rule::InvalidEmail)];
    }
    Vec::new()
}

/// Turn a list of violations into a result.
fn into_result(violations: Vec<Violation>) -> Result<()> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(QuillError::ValidationFailed(violations))
    }
}

/// Validates credentials against the username, email and password rules.
#[derive(Debug, Clone, Default)]
pub struct CredentialValidator {
    policy: PasswordPolicy,
}

impl CredentialValidator {
    /// Create a validator enforcing the given password policy.
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    /// The password policy in force.
    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Validate all registration fields at once.
    ///
    /// Either everything passes or the error carries every failing rule.
    pub fn validate_registration(&self, username: &str, email: &str, password: &str) -> Result<()> {
        let mut violations = check_username(username);
        violations.extend(check_email(email));
        violations.extend(self.policy.check(password, Some(username)));
        into_result(violations)
    }

    /// Validate a replacement password for an existing user.
    pub fn validate_new_password(&self, username: &str, password: &str) -> Result<()> {
        into_result(self.policy.check(password, Some(username)))
    }

    /// Shape check for login input. Policy rules are not applied here.
    pub fn validate_login(&self, identifier: &str, password: &str) -> Result<()> {
        let mut violations = Vec::new();
        if identifier.trim().is_empty() {
            violations.push(Violation::new("identifier", Rule::Required));
        } else if identifier.len() > MAX_IDENTIFIER_LENGTH {
            violations.push(Violation::new(
                "identifier",
                Rule::TooLong {
                    max: MAX_IDENTIFIER_LENGTH,
                },
            ));
        }
        if password.is_empty() {
            violations.push(Violation::new("password", Rule::Required));
        } else if password.chars().count() > self.policy.max_length {
            violations.push(Violation::new(
                "password",
                Rule::TooLong {
                    max: self.policy.max_length,
                },
            ));
        }
        into_result(violations)
    }
}
