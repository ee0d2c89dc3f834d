//! Signed Identity Tokens
//!
//! HS256 JWTs carrying caller-defined claims plus `iat`/`exp`.
//!
//! Verification accepts HS256 only, with zero clock leeway. Every failure
//! (bad signature, expiry, malformed input, foreign algorithm) collapses to
//! [`TokenError::Invalid`]; the precise reason is only logged at debug level.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

/// Default token lifetime (one day)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token signing secret is not configured")]
    MissingSecret,
}

/// Signing configuration
#[derive(Clone)]
pub struct TokenConfig {
    secret: Zeroizing<Vec<u8>>,
    ttl: Duration,
}

impl TokenConfig {
    /// Create a configuration; an empty secret is refused
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Result<Self, TokenError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self { secret, ttl })
    }

    /// Configuration from a fixed-size key, which cannot be empty
    pub fn from_key(key: [u8; 32], ttl: Duration) -> Self {
        Self {
            secret: Zeroizing::new(key.to_vec()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[derive(Serialize)]
struct SignedClaims<'a, C> {
    #[serde(flatten)]
    claims: &'a C,
    iat: u64,
    exp: u64,
}

/// Issues and verifies tokens with a single shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            ttl: config.ttl,
        }
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign `claims`, valid from now until now + ttl
    pub fn issue<C: Serialize>(&self, claims: &C) -> Result<String, TokenError> {
        self.issue_at(claims, get_current_timestamp())
    }

    /// Sign `claims` as if issued at `issued_at` (unix seconds)
    pub fn issue_at<C: Serialize>(&self, claims: &C, issued_at: u64) -> Result<String, TokenError> {
        let signed = SignedClaims {
            claims,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl.as_secs()),
        };

        encode(&Header::new(Algorithm::HS256), &signed, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and expiry, then decode the claims
    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> Result<C, TokenError> {
        decode::<C>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = ?e.kind(), "Token verification failed");
                TokenError::Invalid
            })
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish()
    }
}
