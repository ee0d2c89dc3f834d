//! Rate Limit Policy
//!
//! Chooses the quota for a caller's tier and delegates the verdict to a
//! [`DecisionEngine`].

use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use platform::client::RequestMetadata;
use platform::rate_limit::{AuthDecision, DecisionEngine, DecisionError, DenyReason, RateLimitConfig};

use crate::domain::value_object::user_role::UserRole;
use crate::error::{AuthError, AuthResult};

/// Quota tier of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RateLimitTier {
    /// No token, or a token that failed verification
    #[display("guest")]
    Guest,
    #[display("user")]
    User,
    #[display("admin")]
    Admin,
}

impl RateLimitTier {
    pub fn from_role(role: Option<UserRole>) -> Self {
        match role {
            None => RateLimitTier::Guest,
            Some(UserRole::User) => RateLimitTier::User,
            Some(UserRole::Admin) => RateLimitTier::Admin,
        }
    }

    /// Capitalized name used in client messages
    pub fn label(&self) -> &'static str {
        match self {
            RateLimitTier::Guest => "Guest",
            RateLimitTier::User => "User",
            RateLimitTier::Admin => "Admin",
        }
    }
}

/// Per-tier quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub guest: RateLimitConfig,
    pub user: RateLimitConfig,
    pub admin: RateLimitConfig,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::per_minute(5, 10, 20)
    }
}

impl RateLimitPolicy {
    pub fn per_minute(guest: u32, user: u32, admin: u32) -> Self {
        Self {
            guest: RateLimitConfig::per_minute(guest),
            user: RateLimitConfig::per_minute(user),
            admin: RateLimitConfig::per_minute(admin),
        }
    }

    pub fn limit_for(&self, tier: RateLimitTier) -> &RateLimitConfig {
        match tier {
            RateLimitTier::Guest => &self.guest,
            RateLimitTier::User => &self.user,
            RateLimitTier::Admin => &self.admin,
        }
    }

    /// Longest window of any tier
    pub fn max_window(&self) -> Duration {
        self.guest
            .window
            .max(self.user.window)
            .max(self.admin.window)
    }
}

/// Tier-aware front for a decision engine
pub struct RateLimiter<E> {
    engine: Arc<E>,
    policy: RateLimitPolicy,
    trust_proxy_headers: bool,
}

impl<E> Clone for RateLimiter<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            policy: self.policy,
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}

impl<E> RateLimiter<E>
where
    E: DecisionEngine + Send + Sync + 'static,
{
    /// Buckets are keyed on the TCP peer address
    pub fn new(engine: Arc<E>, policy: RateLimitPolicy) -> Self {
        Self {
            engine,
            policy,
            trust_proxy_headers: false,
        }
    }

    /// Key buckets on `X-Forwarded-For` instead of the peer
    ///
    /// Only for deployments behind a proxy that overwrites the header.
    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    /// Bucket key: `"{tier}-rate-limit:{ip}"`
    pub fn bucket_key(tier: RateLimitTier, request: &RequestMetadata) -> String {
        format!("{}-rate-limit:{}", tier, request.ip_key())
    }

    /// Raw engine verdict for a caller with `role`
    pub async fn decide(
        &self,
        role: Option<UserRole>,
        request: &RequestMetadata,
    ) -> Result<AuthDecision, DecisionError> {
        let tier = RateLimitTier::from_role(role);
        let key = Self::bucket_key(tier, request);
        self.engine
            .decide(&key, self.policy.limit_for(tier), request)
            .await
    }

    /// Admit or refuse; engine failures refuse the request
    pub async fn check(&self, role: Option<UserRole>, request: &RequestMetadata) -> AuthResult<()> {
        let tier = RateLimitTier::from_role(role);

        match self.decide(role, request).await? {
            AuthDecision::Allow { remaining } => {
                tracing::trace!(%tier, remaining, "Request admitted");
                Ok(())
            }
            AuthDecision::Deny(reason) => {
                tracing::warn!(
                    %tier,
                    user_agent = request.user_agent().unwrap_or("-"),
                    ?reason,
                    "Request denied by security middleware"
                );
                Err(match reason {
                    DenyReason::Bot => AuthError::BotDetected,
                    DenyReason::Shield => AuthError::ShieldBlocked,
                    DenyReason::RateLimit { retry_after } => {
                        AuthError::RateLimited { tier, retry_after }
                    }
                })
            }
        }
    }
}
