//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entity::user::{NewUser, User, UserChanges};
use crate::domain::value_object::{email::Email, user_id::UserId};
use crate::error::AuthResult;

/// User repository trait
///
/// Email uniqueness is enforced by the store: `create` and `update` return
/// `AuthError::EmailTaken` on a collision.
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a user and return it with its assigned id and timestamps
    async fn create(&self, user: &NewUser) -> AuthResult<User>;

    /// Find user by ID
    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>>;

    /// Find user by (normalized) email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// Check if email is registered
    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// All users, oldest first
    async fn list(&self) -> AuthResult<Vec<User>>;

    /// Apply `changes` atomically; `None` if no such user
    async fn update(&self, id: UserId, changes: &UserChanges) -> AuthResult<Option<User>>;

    /// Delete a user; `false` if no such user
    async fn delete(&self, id: UserId) -> AuthResult<bool>;
}
