//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Business logic, entities, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, guards, router
//!
//! ## Features
//! - Sign up / sign in with email + password, sign out
//! - Stateless identity tokens (HS256 JWT) in an HttpOnly cookie
//! - User CRUD with self-or-admin ownership rules
//! - Role-based access (User, Admin) and per-role rate limiting
//!
//! ## Security Model
//! - Passwords hashed with bcrypt (cost 10)
//! - Unknown email and wrong password are indistinguishable
//! - Only admins may change roles
//! - Bot / attack-signature / quota checks run before authentication

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::rate_limit::{RateLimitPolicy, RateLimitTier, RateLimiter};
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgUserRepository;
pub use presentation::router::{auth_router, users_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod handlers {
    pub use crate::presentation::handlers::*;
}

pub mod store {
    pub use crate::infra::postgres::PgUserRepository as UserStore;
}

pub mod router {
    pub use crate::presentation::router::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

#[cfg(test)]
mod tests;
