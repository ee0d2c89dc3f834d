//! Identity
//!
//! The caller as proven by a verified token. This is also the token's claim
//! set (`{id, email, role}`), so role changes take effect at the next sign in.

use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;
use crate::domain::value_object::{user_id::UserId, user_role::UserRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Self or admin
    pub fn can_manage(&self, target: UserId) -> bool {
        self.id == target || self.is_admin()
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.as_str().to_string(),
            role: user.role,
        }
    }
}
