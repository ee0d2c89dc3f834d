//! Sign Up Use Case
//!
//! Creates a new user account and issues its first token.

use std::sync::Arc;

use platform::token::TokenService;

use crate::application::config::AuthConfig;
use crate::application::parse_role;
use crate::domain::entity::{identity::Identity, user::NewUser, user::User};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Sign up input
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Requested role; defaults to `user`
    pub role: Option<String>,
}

/// Sign up output
pub struct SignUpOutput {
    pub user: User,
    pub token: String,
}

/// Sign up use case
pub struct SignUpUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
    tokens: Arc<TokenService>,
    config: Arc<AuthConfig>,
}

impl<U> SignUpUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>, tokens: Arc<TokenService>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            tokens,
            config,
        }
    }

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<SignUpOutput> {
        // Validate every field so the client sees all problems at once
        let name = UserName::new(&input.name);
        let email = Email::new(&input.email);
        let password = RawPassword::new(input.password);
        let role = parse_role(input.role.as_deref());

        let (name, email, password, role) = match (name, email, password, role) {
            (Ok(name), Ok(email), Ok(password), Ok(role)) => (name, email, password, role),
            (name, email, password, role) => {
                let details = [name.err(), email.err(), password.err(), role.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                return Err(AuthError::Validation(details));
            }
        };

        // Fast path only; the unique index decides races
        if self.user_repo.exists_by_email(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password = UserPassword::hash(password, self.config.password_cost).await?;

        let user = self
            .user_repo
            .create(&NewUser {
                name,
                email,
                password,
                role: role.unwrap_or_default(),
            })
            .await?;

        let token = self.tokens.issue(&Identity::from(&user))?;

        tracing::info!(
            user_id = %user.id,
            role = %user.role,
            "User signed up"
        );

        Ok(SignUpOutput { user, token })
    }
}
