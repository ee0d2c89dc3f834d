//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod delete_user;
pub mod get_user;
pub mod list_users;
pub mod rate_limit;
pub mod sign_in;
pub mod sign_up;
pub mod update_user;

// Re-exports
pub use config::AuthConfig;
pub use delete_user::DeleteUserUseCase;
pub use get_user::GetUserUseCase;
pub use list_users::ListUsersUseCase;
pub use rate_limit::{RateLimitPolicy, RateLimitTier, RateLimiter};
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use update_user::{UpdateUserInput, UpdateUserUseCase};

use kernel::error::app_error::FieldError;

use crate::domain::value_object::user_role::UserRole;

/// Parse an optional role field from a request body
pub(crate) fn parse_role(raw: Option<&str>) -> Result<Option<UserRole>, FieldError> {
    raw.map(|r| {
        r.trim()
            .parse::<UserRole>()
            .map_err(|_| FieldError::new("role", "Role must be one of: user, admin"))
    })
    .transpose()
}
