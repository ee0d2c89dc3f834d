//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Password hashing (bcrypt, cost 10) with a new-password policy
//! - Signed identity tokens (JWT, HS256 only)
//! - Cookie management
//! - Client identification and request metadata
//! - Rate limiting / bot / shield decision engine

pub mod client;
pub mod cookie;
pub mod password;
pub mod rate_limit;
pub mod token;
