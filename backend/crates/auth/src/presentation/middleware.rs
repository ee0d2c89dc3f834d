//! Auth Middleware
//!
//! Request guards, outermost first:
//! 1. `security_guard`: bot / shield / per-tier quota
//! 2. `authenticate`: verified token → `Identity` in request extensions
//! 3. `require_role`: role allow-list
//!
//! Handlers read the identity through the [`CurrentUser`] extractor.

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use platform::client::RequestMetadata;
use platform::cookie::extract_token;
use platform::rate_limit::DecisionEngine;
use platform::token::TokenService;
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::rate_limit::RateLimiter;
use crate::domain::entity::identity::Identity;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthError;

/// Routes restricted to administrators
pub const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

/// Middleware state
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub tokens: Arc<TokenService>,
    pub config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    fn token(&self, headers: &HeaderMap) -> Option<String> {
        extract_token(headers, &self.config.cookie_name)
    }
}

/// Middleware that requires a valid token
///
/// On success the verified [`Identity`] is attached to the request.
pub async fn authenticate(
    State(state): State<AuthMiddlewareState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = state.token(req.headers()).ok_or(AuthError::MissingToken)?;
    let identity: Identity = state.tokens.verify(&token)?;

    tracing::debug!(user_id = %identity.id, role = %identity.role, "Authenticated");
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Middleware that admits only identities whose role is in `allowed`
///
/// Must run inside [`authenticate`].
pub async fn require_role(
    State(allowed): State<&'static [UserRole]>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::Unauthenticated)?;

    if !allowed.contains(&identity.role) {
        tracing::warn!(user_id = %identity.id, role = %identity.role, "Insufficient role");
        return Err(AuthError::InsufficientRole);
    }

    Ok(next.run(req).await)
}

/// Rate limiter state
pub struct SecurityState<E> {
    pub auth: AuthMiddlewareState,
    pub limiter: RateLimiter<E>,
}

impl<E> Clone for SecurityState<E> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

/// Middleware that consults the decision engine before anything else
///
/// The tier comes from an optional token check; a missing or invalid token
/// is treated as a guest and no identity is attached here.
pub async fn security_guard<E>(
    State(state): State<SecurityState<E>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError>
where
    E: DecisionEngine + Send + Sync + 'static,
{
    let role = state
        .auth
        .token(req.headers())
        .and_then(|token| state.auth.tokens.verify::<Identity>(&token).ok())
        .map(|identity| identity.role);

    let metadata = RequestMetadata::from_request(&req, state.limiter.trusts_proxy_headers());
    state.limiter.check(role, &metadata).await?;

    Ok(next.run(req).await)
}

/// Authenticated caller, as attached by [`authenticate`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AuthError::Unauthenticated)
    }
}
