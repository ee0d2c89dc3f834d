//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use std::time::Duration;

use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{
    app_error::{AppError, FieldError},
    kind::ErrorKind,
};
use platform::password::PasswordHashError;
use platform::rate_limit::DecisionError;
use platform::token::TokenError;
use thiserror::Error;

use crate::application::rate_limit::RateLimitTier;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Request body failed validation
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Path id is not a positive integer
    #[error("Invalid user id")]
    InvalidUserId,

    /// Email already registered
    #[error("User already exists")]
    EmailTaken,

    /// Unknown email or wrong password (indistinguishable on purpose)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No token in cookie or Authorization header
    #[error("Unauthorized: No token provided")]
    MissingToken,

    /// Token failed verification
    #[error("Unauthorized: Invalid token")]
    InvalidToken,

    /// Handler reached without an authenticated identity
    #[error("Unauthorized")]
    Unauthenticated,

    /// Role not in the route's allowed set
    #[error("Forbidden: Insufficient permissions")]
    InsufficientRole,

    #[error("Forbidden: You can only update your own information")]
    NotOwnerUpdate,

    #[error("Forbidden: Only admins can change user roles")]
    RoleChangeForbidden,

    #[error("Forbidden: You can only delete your own account")]
    NotOwnerDelete,

    /// User not found
    #[error("User not found")]
    UserNotFound,

    #[error("Automated requests are not allowed")]
    BotDetected,

    #[error("Request blocked by security shield")]
    ShieldBlocked,

    #[error("{} request limit exceeded. Slow down", .tier.label())]
    RateLimited {
        tier: RateLimitTier,
        retry_after: Duration,
    },

    /// Decision engine failed; requests are refused, not waved through
    #[error("Something went wrong with security middleware")]
    SecurityEngine(#[from] DecisionError),

    /// Password hashing failure
    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] PasswordHashError),

    /// Token signing failure
    #[error("Token error: {0}")]
    Token(TokenError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::InvalidUserId | AuthError::EmailTaken => {
                ErrorKind::BadRequest
            }
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::Unauthenticated => ErrorKind::Unauthorized,
            AuthError::InsufficientRole
            | AuthError::NotOwnerUpdate
            | AuthError::RoleChangeForbidden
            | AuthError::NotOwnerDelete
            | AuthError::BotDetected
            | AuthError::ShieldBlocked => ErrorKind::Forbidden,
            AuthError::UserNotFound => ErrorKind::NotFound,
            AuthError::RateLimited { .. } => ErrorKind::TooManyRequests,
            AuthError::SecurityEngine(_)
            | AuthError::PasswordHash(_)
            | AuthError::Token(_)
            | AuthError::Database(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Message safe to show to clients
    pub fn public_message(&self) -> String {
        match self {
            AuthError::PasswordHash(_)
            | AuthError::Token(_)
            | AuthError::Database(_)
            | AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let error = AppError::new(self.kind(), self.public_message());
        match self {
            AuthError::Validation(details) => error.with_details(details.clone()),
            _ => error,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::PasswordHash(e) => {
                tracing::error!(error = %e, "Password hashing failed");
            }
            AuthError::Token(e) => {
                tracing::error!(error = %e, "Token signing failed");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::SecurityEngine(e) => {
                tracing::error!(error = %e, "Security decision engine failed");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::BotDetected => {
                tracing::warn!("Bot request blocked");
            }
            AuthError::ShieldBlocked => {
                tracing::warn!("Shield request blocked");
            }
            AuthError::RateLimited { tier, retry_after } => {
                tracing::warn!(%tier, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            }
            AuthError::InsufficientRole
            | AuthError::NotOwnerUpdate
            | AuthError::RoleChangeForbidden
            | AuthError::NotOwnerDelete => {
                tracing::warn!(reason = %self, "Access denied");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let mut response = self.to_app_error().into_response();

        if let AuthError::RateLimited { retry_after, .. } = &self {
            // Round up so clients never retry inside the window
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            other => AuthError::Token(other),
        }
    }
}
