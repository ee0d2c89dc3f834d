//! User ID
//!
//! Numeric primary key assigned by the database (`BIGSERIAL`).

use kernel::id::Id;

pub struct UserMarker;
pub type UserId = Id<UserMarker>;
