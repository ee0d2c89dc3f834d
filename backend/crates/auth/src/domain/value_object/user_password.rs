//! User Password Value Object
//!
//! Domain wrappers around `platform::password`.
//!
//! - `RawPassword`: transient user input, zeroized on drop, never logged
//! - `UserPassword`: bcrypt hash, safe to store
//!
//! Hashing and verification run on the blocking pool.

use std::fmt;

use kernel::error::app_error::FieldError;
use platform::password::{
    ClearTextPassword, HashedPassword, PasswordPolicyError, equalize_timing, hash_password,
    verify_password,
};

use crate::error::{AuthError, AuthResult};

// ============================================================================
// Raw Password (User Input)
// ============================================================================

/// Raw password from user input
pub struct RawPassword(ClearTextPassword);

impl RawPassword {
    /// New password chosen by the user; the password policy applies
    pub fn new(raw: String) -> Result<Self, FieldError> {
        ClearTextPassword::new(raw)
            .map(Self)
            .map_err(|e| FieldError::new("password", policy_message(&e)))
    }

    /// Password presented at sign in; only normalized, never rejected
    pub fn for_verification(raw: String) -> Self {
        Self(ClearTextPassword::for_verification(raw))
    }

    /// Burn the same CPU time as a real verification
    pub async fn equalize_timing(self) {
        equalize_timing(self.0).await;
    }
}

fn policy_message(err: &PasswordPolicyError) -> String {
    match err {
        PasswordPolicyError::TooShort { min, .. } => {
            format!("Password must be at least {} characters", min)
        }
        PasswordPolicyError::TooLong { max, .. } => {
            format!("Password must be at most {} bytes", max)
        }
        PasswordPolicyError::EmptyOrWhitespace => "Password is required".to_string(),
        PasswordPolicyError::InvalidCharacter => {
            "Password contains invalid characters".to_string()
        }
        PasswordPolicyError::CommonPassword => "Password is too common".to_string(),
    }
}

impl fmt::Debug for RawPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RawPassword").field(&"[REDACTED]").finish()
    }
}

// ============================================================================
// User Password (Hashed, for storage)
// ============================================================================

/// Hashed user password for database storage
#[derive(Clone, PartialEq, Eq)]
pub struct UserPassword(HashedPassword);

impl UserPassword {
    /// Hash a raw password with bcrypt at `cost`
    pub async fn hash(raw: RawPassword, cost: u32) -> AuthResult<Self> {
        let hashed = hash_password(raw.0, cost).await?;
        Ok(Self(hashed))
    }

    /// Create from the stored hash string
    pub fn from_db(hash: impl Into<String>) -> AuthResult<Self> {
        HashedPassword::from_hash_string(hash)
            .map(Self)
            .map_err(AuthError::from)
    }

    /// Hash string for storage
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Check a presented password against this hash
    ///
    /// A malformed hash is an error, never a mismatch.
    pub async fn verify(&self, raw: RawPassword) -> AuthResult<bool> {
        Ok(verify_password(raw.0, self.0.clone()).await?)
    }
}

impl fmt::Debug for UserPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
