//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{
    AuthMiddlewareState, CurrentUser, SecurityState, authenticate, require_role, security_guard,
};
pub use router::{auth_router, auth_router_generic, users_router, users_router_generic};
