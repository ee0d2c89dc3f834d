//! Update User Use Case
//!
//! Partial update with ownership and role-change rules:
//! - non-admins may only update themselves
//! - only admins may set `role`, for anyone including themselves

use std::sync::Arc;

use crate::application::parse_role;
use crate::domain::entity::{identity::Identity, user::User, user::UserChanges};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{email::Email, user_id::UserId, user_name::UserName};
use crate::error::{AuthError, AuthResult};

/// Update input (raw request fields)
pub struct UpdateUserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

pub struct UpdateUserUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> UpdateUserUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn execute(
        &self,
        actor: &Identity,
        target: UserId,
        input: UpdateUserInput,
    ) -> AuthResult<User> {
        let changes = Self::validate(input)?;

        if !actor.can_manage(target) {
            return Err(AuthError::NotOwnerUpdate);
        }
        if changes.role.is_some() && !actor.is_admin() {
            return Err(AuthError::RoleChangeForbidden);
        }

        let user = self
            .user_repo
            .update(target, &changes)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            actor_id = %actor.id,
            user_id = %user.id,
            role_changed = changes.role.is_some(),
            "User updated"
        );

        Ok(user)
    }

    fn validate(input: UpdateUserInput) -> AuthResult<UserChanges> {
        let name = input.name.as_deref().map(UserName::new).transpose();
        let email = input.email.as_deref().map(Email::new).transpose();
        let role = parse_role(input.role.as_deref());

        match (name, email, role) {
            (Ok(name), Ok(email), Ok(role)) => Ok(UserChanges { name, email, role }),
            (name, email, role) => Err(AuthError::Validation(
                [name.err(), email.err(), role.err()]
                    .into_iter()
                    .flatten()
                    .collect(),
            )),
        }
    }
}
