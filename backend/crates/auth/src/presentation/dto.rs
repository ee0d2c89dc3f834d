//! API DTOs (Data Transfer Objects)
//!
//! Response types never carry the password hash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};

// ============================================================================
// Requests
// ============================================================================

/// Sign up request
///
/// Missing fields deserialize as empty and are reported by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// Sign in request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Partial user update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

// ============================================================================
// Responses
// ============================================================================

/// Account summary returned by sign up / sign in
#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<&User> for AccountResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            role: user.role,
        }
    }
}

/// Full user record
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Sign up / sign in body
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: AccountResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEnvelope {
    pub message: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListResponse {
    pub message: &'static str,
    pub users: Vec<UserResponse>,
    pub count: usize,
}
