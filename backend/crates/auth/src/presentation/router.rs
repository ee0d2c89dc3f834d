//! Auth and User Routers

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use platform::rate_limit::{DecisionEngine, SlidingWindowEngine};

use crate::application::config::AuthConfig;
use crate::application::rate_limit::RateLimiter;
use crate::domain::repository::UserRepository;
use crate::infra::postgres::PgUserRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{
    ADMIN_ONLY, AuthMiddlewareState, SecurityState, authenticate, require_role, security_guard,
};

fn guard_states<R, E>(
    state: &AuthAppState<R>,
    limiter: RateLimiter<E>,
) -> (AuthMiddlewareState, SecurityState<E>)
where
    R: UserRepository + Send + Sync + 'static,
{
    let auth = AuthMiddlewareState {
        tokens: state.tokens.clone(),
        config: state.config.clone(),
    };
    let security = SecurityState {
        auth: auth.clone(),
        limiter,
    };
    (auth, security)
}

/// Create the Auth router with PostgreSQL repository
pub fn auth_router(
    repo: PgUserRepository,
    config: AuthConfig,
    limiter: RateLimiter<SlidingWindowEngine>,
) -> Router {
    auth_router_generic(repo, config, limiter)
}

/// Create a generic Auth router for any repository / engine implementation
///
/// Mount under `/api/auth`.
pub fn auth_router_generic<R, E>(repo: R, config: AuthConfig, limiter: RateLimiter<E>) -> Router
where
    R: UserRepository + Send + Sync + 'static,
    E: DecisionEngine + Send + Sync + 'static,
{
    let state = AuthAppState::new(repo, config);
    let (_, security) = guard_states(&state, limiter);

    Router::new()
        .route("/signup", post(handlers::sign_up::<R>))
        .route("/signin", post(handlers::sign_in::<R>))
        .route("/signout", post(handlers::sign_out::<R>))
        .route_layer(from_fn_with_state(security, security_guard::<E>))
        .with_state(state)
}

/// Create the Users router with PostgreSQL repository
pub fn users_router(
    repo: PgUserRepository,
    config: AuthConfig,
    limiter: RateLimiter<SlidingWindowEngine>,
) -> Router {
    users_router_generic(repo, config, limiter)
}

/// Create a generic Users router
///
/// Mount under `/api/users`. Every route requires a valid token; listing
/// additionally requires the admin role.
pub fn users_router_generic<R, E>(repo: R, config: AuthConfig, limiter: RateLimiter<E>) -> Router
where
    R: UserRepository + Send + Sync + 'static,
    E: DecisionEngine + Send + Sync + 'static,
{
    let state = AuthAppState::new(repo, config);
    let (auth, security) = guard_states(&state, limiter);

    Router::new()
        .route(
            "/",
            get(handlers::list_users::<R>).route_layer(from_fn_with_state(ADMIN_ONLY, require_role)),
        )
        .route(
            "/{id}",
            get(handlers::get_user::<R>)
                .put(handlers::update_user::<R>)
                .delete(handlers::delete_user::<R>),
        )
        .route_layer(from_fn_with_state(auth, authenticate))
        .route_layer(from_fn_with_state(security, security_guard::<E>))
        .with_state(state)
}
