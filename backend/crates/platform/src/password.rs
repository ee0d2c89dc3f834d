//! Password Hashing and Verification
//!
//! - bcrypt hashing with a random salt per hash (cost 10 by default)
//! - Zeroization of clear text passwords
//! - Policy checks for newly chosen passwords
//! - Hashing runs on the blocking thread pool so async workers are not stalled
//!
//! Verification failures caused by a malformed hash or an internal error are
//! reported as [`PasswordHashError`], never as a plain mismatch.

use std::fmt;
use std::sync::LazyLock;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// bcrypt work factor used for new hashes
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only consumes the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Length of a modular-crypt bcrypt string (`$2b$10$` + 53 chars)
const BCRYPT_HASH_LEN: usize = 60;

static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("timing-equalizer", DEFAULT_BCRYPT_COST).ok());

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("Password must be at most {max} bytes (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("Password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("Password contains invalid control characters")]
    InvalidCharacter,

    #[error("Password is too common")]
    CommonPassword,
}

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// The stored hash is not a bcrypt string
    #[error("Invalid password hash format")]
    InvalidHashFormat,

    /// bcrypt itself failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// The blocking task panicked or was cancelled
    #[error("Password hashing task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Not `Clone`, and `Debug` output is redacted, so the value cannot end up
/// in logs by accident.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new password chosen by a user (sign up, password change)
    ///
    /// Unicode is normalized using NFKC before validation.
    pub fn new(raw: String) -> Result<Self, PasswordPolicyError> {
        let candidate = Self::for_verification(raw);
        let normalized = candidate.0.as_str();

        if normalized.trim().is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        let char_count = normalized.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if normalized.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_BYTES,
                actual: normalized.len(),
            });
        }

        if normalized
            .chars()
            .any(|ch| ch.is_control() && ch != '\t')
        {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if is_common_password(normalized) {
            return Err(PasswordPolicyError::CommonPassword);
        }

        Ok(candidate)
    }

    /// Wrap a password presented for verification (sign in)
    ///
    /// Only normalization is applied: policy changes must never lock out
    /// existing accounts.
    pub fn for_verification(raw: String) -> Self {
        let mut raw = raw;
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        Self(normalized)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Hash the password with bcrypt at the given cost
    pub fn hash(&self, cost: u32) -> Result<HashedPassword, PasswordHashError> {
        let hash = bcrypt::hash(self.as_bytes(), cost)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword { hash })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// bcrypt hash in modular crypt format (`$2b$<cost>$<salt+hash>`)
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from a stored hash string, checking its shape
    pub fn from_hash_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        if hash.len() != BCRYPT_HASH_LEN || !hash.starts_with("$2") {
            return Err(PasswordHashError::InvalidHashFormat);
        }
        Ok(Self { hash })
    }

    /// Get the hash string for storage
    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash
    ///
    /// bcrypt compares digests in constant time.
    pub fn verify(&self, password: &ClearTextPassword) -> Result<bool, PasswordHashError> {
        bcrypt::verify(password.as_bytes(), &self.hash)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()))
    }

    /// Work factor recorded in the hash
    pub fn cost(&self) -> Option<u32> {
        self.hash.split('$').nth(2)?.parse().ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Async entry points
// ============================================================================

/// Hash on the blocking pool
pub async fn hash_password(
    password: ClearTextPassword,
    cost: u32,
) -> Result<HashedPassword, PasswordHashError> {
    tokio::task::spawn_blocking(move || password.hash(cost))
        .await
        .map_err(|e| PasswordHashError::TaskFailed(e.to_string()))?
}

/// Verify on the blocking pool
pub async fn verify_password(
    password: ClearTextPassword,
    hashed: HashedPassword,
) -> Result<bool, PasswordHashError> {
    tokio::task::spawn_blocking(move || hashed.verify(&password))
        .await
        .map_err(|e| PasswordHashError::TaskFailed(e.to_string()))?
}

/// Spend the same work as a real verification and discard the result
///
/// Used when no account matches, so response time does not reveal whether
/// an email is registered.
pub async fn equalize_timing(password: ClearTextPassword) {
    let result = tokio::task::spawn_blocking(move || {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = bcrypt::verify(password.as_bytes(), hash);
        }
    })
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, "Timing equalizer task failed");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn is_common_password(password: &str) -> bool {
    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "12345678",
        "123456789",
        "1234567890",
        "qwertyuiop",
        "abcdefgh",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "baseball",
        "trustno1",
        "letmein1",
        "welcome1",
        "admin123",
    ];

    let lower = password.to_lowercase();
    COMMON_PASSWORDS.contains(&lower.as_str())
}

// ============================================================================
// Tests
// ============================================================================
