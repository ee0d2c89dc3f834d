//! Application Configuration
//!
//! Configuration for the Auth application layer.

use platform::cookie::CookieConfig;
use platform::password::DEFAULT_BCRYPT_COST;
use platform::token::{DEFAULT_TOKEN_TTL, TokenConfig};

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token signing secret and lifetime
    pub token: TokenConfig,
    /// Token cookie name
    pub cookie_name: String,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// bcrypt work factor for new hashes
    pub password_cost: u32,
}

impl AuthConfig {
    pub fn new(token: TokenConfig) -> Self {
        Self {
            token,
            cookie_name: platform::cookie::TOKEN_COOKIE_NAME.to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
            password_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Create config with a random signing secret (tokens die with the process)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self::new(TokenConfig::from_key(secret, DEFAULT_TOKEN_TTL))
    }

    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::with_random_secret()
        }
    }

    /// Cookie carrying the token; expires together with it
    pub fn cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: Some(i64::try_from(self.token.ttl().as_secs()).unwrap_or(i64::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_follows_token_ttl() {
        let config = AuthConfig::development();
        let cookie = config.cookie().build_set_cookie("abc");

        assert!(cookie.starts_with("token=abc"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_production_defaults() {
        let config = AuthConfig::with_random_secret();
        assert!(config.cookie_secure);
        assert_eq!(config.password_cost, 10);
    }
}
