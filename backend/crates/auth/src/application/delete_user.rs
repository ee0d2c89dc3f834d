//! Delete User Use Case

use std::sync::Arc;

use crate::domain::entity::identity::Identity;
use crate::domain::repository::UserRepository;
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};

/// Self-service or admin account deletion
pub struct DeleteUserUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> DeleteUserUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    pub async fn execute(&self, actor: &Identity, target: UserId) -> AuthResult<()> {
        if !actor.can_manage(target) {
            return Err(AuthError::NotOwnerDelete);
        }

        if !self.user_repo.delete(target).await? {
            return Err(AuthError::UserNotFound);
        }

        tracing::info!(actor_id = %actor.id, user_id = %target, "User deleted");
        Ok(())
    }
}
