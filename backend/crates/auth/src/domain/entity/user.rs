//! User Entity
//!
//! A stored account. The password hash never leaves the server; see
//! `presentation::dto::UserResponse` for the sanitized projection.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_password::UserPassword,
    user_role::UserRole,
};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    /// Database-assigned identifier
    pub id: UserId,
    /// Display name
    pub name: UserName,
    /// Login email (unique, lowercase)
    pub email: Email,
    /// bcrypt hash
    pub password: UserPassword,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated data for a user that does not exist yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: UserName,
    pub email: Email,
    pub password: UserPassword,
    pub role: UserRole,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<UserName>,
    pub email: Option<Email>,
    pub role: Option<UserRole>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none()
    }
}
