//! HTTP Handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use kernel::error::app_error::FieldError;
use platform::token::TokenService;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::{
    DeleteUserUseCase, GetUserUseCase, ListUsersUseCase, SignInInput, SignInUseCase,
    SignUpInput, SignUpUseCase, UpdateUserInput, UpdateUserUseCase,
};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::user_id::UserId;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    AccountResponse, AuthResponse, MessageResponse, SignInRequest, SignUpRequest,
    UpdateUserRequest, UserEnvelope, UserListResponse, UserResponse,
};
use crate::presentation::middleware::CurrentUser;

/// Shared state for auth and user handlers
pub struct AuthAppState<R>
where
    R: UserRepository + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AuthConfig>,
}

impl<R> Clone for AuthAppState<R>
where
    R: UserRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> AuthAppState<R>
where
    R: UserRepository + Send + Sync + 'static,
{
    pub fn new(repo: R, config: AuthConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            tokens: Arc::new(TokenService::new(&config.token)),
            config: Arc::new(config),
        }
    }
}

/// Unwrap a JSON body, turning syntax/type errors into a validation error
fn json_body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> AuthResult<T> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        AuthError::Validation(vec![FieldError::new("body", rejection.body_text())])
    })
}

fn parse_user_id(raw: &str) -> AuthResult<UserId> {
    raw.parse().map_err(|_| AuthError::InvalidUserId)
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /api/auth/signup
pub async fn sign_up<R>(
    State(state): State<AuthAppState<R>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Send + Sync + 'static,
{
    let req = json_body(payload)?;
    let use_case = SignUpUseCase::new(state.repo.clone(), state.tokens.clone(), state.config.clone());

    let output = use_case
        .execute(SignUpInput {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    let cookie = state.config.cookie().build_set_cookie(&output.token);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Account created successfully",
            user: AccountResponse::from(&output.user),
        }),
    ))
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /api/auth/signin
pub async fn sign_in<R>(
    State(state): State<AuthAppState<R>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse>
where
    R: UserRepository + Send + Sync + 'static,
{
    let req = json_body(payload)?;
    let use_case = SignInUseCase::new(state.repo.clone(), state.tokens.clone());

    let output = use_case
        .execute(SignInInput {
            email: req.email,
            password: req.password,
        })
        .await?;

    let cookie = state.config.cookie().build_set_cookie(&output.token);

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            message: "Login successful",
            user: AccountResponse::from(&output.user),
        }),
    ))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /api/auth/signout
///
/// Tokens are stateless; signing out only clears the cookie.
pub async fn sign_out<R>(State(state): State<AuthAppState<R>>) -> impl IntoResponse
where
    R: UserRepository + Send + Sync + 'static,
{
    let cookie = state.config.cookie().build_delete_cookie();

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/users (admin)
pub async fn list_users<R>(
    State(state): State<AuthAppState<R>>,
) -> AuthResult<Json<UserListResponse>>
where
    R: UserRepository + Send + Sync + 'static,
{
    let users = ListUsersUseCase::new(state.repo.clone()).execute().await?;
    let users: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();

    Ok(Json(UserListResponse {
        message: "Successfully fetched users",
        count: users.len(),
        users,
    }))
}

/// GET /api/users/{id}
pub async fn get_user<R>(
    State(state): State<AuthAppState<R>>,
    Path(id): Path<String>,
) -> AuthResult<Json<UserEnvelope>>
where
    R: UserRepository + Send + Sync + 'static,
{
    let id = parse_user_id(&id)?;
    let user = GetUserUseCase::new(state.repo.clone()).execute(id).await?;

    Ok(Json(UserEnvelope {
        message: "Successfully fetched user",
        user: UserResponse::from(&user),
    }))
}

/// PUT /api/users/{id}
pub async fn update_user<R>(
    State(state): State<AuthAppState<R>>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AuthResult<Json<UserEnvelope>>
where
    R: UserRepository + Send + Sync + 'static,
{
    let id = parse_user_id(&id)?;
    let req = json_body(payload)?;

    let user = UpdateUserUseCase::new(state.repo.clone())
        .execute(
            &actor,
            id,
            UpdateUserInput {
                name: req.name,
                email: req.email,
                role: req.role,
            },
        )
        .await?;

    Ok(Json(UserEnvelope {
        message: "Successfully updated user",
        user: UserResponse::from(&user),
    }))
}

/// DELETE /api/users/{id}
pub async fn delete_user<R>(
    State(state): State<AuthAppState<R>>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<String>,
) -> AuthResult<Json<MessageResponse>>
where
    R: UserRepository + Send + Sync + 'static,
{
    let id = parse_user_id(&id)?;
    DeleteUserUseCase::new(state.repo.clone())
        .execute(&actor, id)
        .await?;

    Ok(Json(MessageResponse {
        message: "Successfully deleted user",
    }))
}
