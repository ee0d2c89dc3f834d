//! Sign In Use Case
//!
//! Authenticates a user by email and password and issues a token.

use std::sync::Arc;

use kernel::error::app_error::FieldError;
use platform::token::TokenService;

use crate::domain::entity::{identity::Identity, user::User};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Sign in output
pub struct SignInOutput {
    pub user: User,
    pub token: String,
}

/// Sign in use case
pub struct SignInUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    tokens: Arc<TokenService>,
}

impl<U> SignInUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, tokens: Arc<TokenService>) -> Self {
        Self { user_repo, tokens }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        let email = Email::new(&input.email);
        let password_missing = input.password.is_empty();

        let email = match (email, password_missing) {
            (Ok(email), false) => email,
            (email, _) => {
                let mut details: Vec<FieldError> = email.err().into_iter().collect();
                if password_missing {
                    details.push(FieldError::new("password", "Password is required"));
                }
                return Err(AuthError::Validation(details));
            }
        };

        // The password policy is not applied here: accounts created under an
        // older policy must still be able to sign in.
        let password = RawPassword::for_verification(input.password);

        let Some(user) = self.user_repo.find_by_email(&email).await? else {
            password.equalize_timing().await;
            return Err(AuthError::InvalidCredentials);
        };

        if !user.password.verify(password).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.tokens.issue(&Identity::from(&user))?;

        tracing::info!(user_id = %user.id, "User signed in");

        Ok(SignInOutput { user, token })
    }
}
