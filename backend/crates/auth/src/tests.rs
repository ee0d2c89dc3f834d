//! Scenario tests for the auth crate
//!
//! HTTP-level tests drive the generic routers with `tower::ServiceExt::oneshot`
//! against an in-memory repository that enforces email uniqueness the same
//! way the `users` table does.

#[cfg(test)]
mod support {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, Response, header};
    use chrono::Utc;
    use platform::rate_limit::SlidingWindowEngine;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::application::config::AuthConfig;
    use crate::application::rate_limit::{RateLimitPolicy, RateLimiter};
    use crate::domain::entity::user::{NewUser, User, UserChanges};
    use crate::domain::repository::UserRepository;
    use crate::domain::value_object::{email::Email, user_id::UserId};
    use crate::error::{AuthError, AuthResult};
    use crate::presentation::router::{auth_router_generic, users_router_generic};

    pub const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    pub const PASSWORD: &str = "Correct-Horse-42";

    #[derive(Default)]
    struct MemoryState {
        next_id: i64,
        users: Vec<User>,
    }

    /// In-memory `UserRepository`
    #[derive(Clone, Default)]
    pub struct MemoryUserRepository {
        state: Arc<Mutex<MemoryState>>,
    }

    impl MemoryUserRepository {
        pub fn len(&self) -> usize {
            self.state.lock().unwrap().users.len()
        }
    }

    impl UserRepository for MemoryUserRepository {
        async fn create(&self, user: &NewUser) -> AuthResult<User> {
            let mut state = self.state.lock().unwrap();
            if state.users.iter().any(|u| u.email == user.email) {
                return Err(AuthError::EmailTaken);
            }

            state.next_id += 1;
            let now = Utc::now();
            let created = User {
                id: UserId::from_db(state.next_id),
                name: user.name.clone(),
                email: user.email.clone(),
                password: user.password.clone(),
                role: user.role,
                created_at: now,
                updated_at: now,
            };
            state.users.push(created.clone());
            Ok(created)
        }

        async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| &u.email == email).cloned())
        }

        async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
            Ok(self.find_by_email(email).await?.is_some())
        }

        async fn list(&self) -> AuthResult<Vec<User>> {
            Ok(self.state.lock().unwrap().users.clone())
        }

        async fn update(&self, id: UserId, changes: &UserChanges) -> AuthResult<Option<User>> {
            let mut state = self.state.lock().unwrap();

            if let Some(email) = &changes.email {
                if state.users.iter().any(|u| u.id != id && &u.email == email) {
                    return Err(AuthError::EmailTaken);
                }
            }

            let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
                return Ok(None);
            };
            if let Some(name) = &changes.name {
                user.name = name.clone();
            }
            if let Some(email) = &changes.email {
                user.email = email.clone();
            }
            if let Some(role) = changes.role {
                user.role = role;
            }
            user.updated_at = Utc::now();
            Ok(Some(user.clone()))
        }

        async fn delete(&self, id: UserId) -> AuthResult<bool> {
            let mut state = self.state.lock().unwrap();
            let before = state.users.len();
            state.users.retain(|u| u.id != id);
            Ok(state.users.len() != before)
        }
    }

    /// Store whose pre-check always misses, as when a concurrent signup
    /// commits between the existence check and the insert
    #[derive(Clone, Default)]
    pub struct StalePrecheckRepository {
        pub inner: MemoryUserRepository,
    }

    impl UserRepository for StalePrecheckRepository {
        async fn create(&self, user: &NewUser) -> AuthResult<User> {
            self.inner.create(user).await
        }

        async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
            self.inner.find_by_email(email).await
        }

        async fn exists_by_email(&self, _email: &Email) -> AuthResult<bool> {
            Ok(false)
        }

        async fn list(&self) -> AuthResult<Vec<User>> {
            self.inner.list().await
        }

        async fn update(&self, id: UserId, changes: &UserChanges) -> AuthResult<Option<User>> {
            self.inner.update(id, changes).await
        }

        async fn delete(&self, id: UserId) -> AuthResult<bool> {
            self.inner.delete(id).await
        }
    }

    pub fn test_config() -> AuthConfig {
        AuthConfig {
            password_cost: 4,
            ..AuthConfig::development()
        }
    }

    /// Full API with the given quotas
    pub fn app_with_policy(
        repo: MemoryUserRepository,
        config: AuthConfig,
        policy: RateLimitPolicy,
    ) -> Router {
        let limiter = RateLimiter::new(Arc::new(SlidingWindowEngine::new()), policy);
        app_with_limiter(repo, config, limiter)
    }

    /// Full API over any repository, sharing one limiter
    pub fn app_with_limiter<R>(
        repo: R,
        config: AuthConfig,
        limiter: RateLimiter<SlidingWindowEngine>,
    ) -> Router
    where
        R: UserRepository + Clone + Send + Sync + 'static,
    {
        Router::new()
            .nest(
                "/api/auth",
                auth_router_generic(repo.clone(), config.clone(), limiter.clone()),
            )
            .nest("/api/users", users_router_generic(repo, config, limiter))
    }

    /// Full API with quotas high enough to stay out of the way
    pub fn app<R>(repo: R, config: AuthConfig) -> Router
    where
        R: UserRepository + Clone + Send + Sync + 'static,
    {
        let policy = RateLimitPolicy::per_minute(1_000, 1_000, 1_000);
        let limiter = RateLimiter::new(Arc::new(SlidingWindowEngine::new()), policy);
        app_with_limiter(repo, config, limiter)
    }

    pub fn request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, BROWSER_UA);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("token={token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    pub async fn json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Token value from the `Set-Cookie` header
    pub fn token_cookie(response: &Response<Body>) -> Option<String> {
        let cookie = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        let value = cookie.strip_prefix("token=")?.split(';').next()?;
        (!value.is_empty()).then(|| value.to_string())
    }

    /// Sign up and return `(id, token)`
    pub async fn sign_up(app: &Router, name: &str, email: &str, role: Option<&str>) -> (i64, String) {
        let mut body = serde_json::json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
        });
        if let Some(role) = role {
            body["role"] = Value::from(role);
        }

        let response = send(app, request(Method::POST, "/api/auth/signup", Some(body), None)).await;
        assert_eq!(response.status(), 201);
        let token = token_cookie(&response).unwrap();
        let body = json(response).await;
        (body["user"]["id"].as_i64().unwrap(), token)
    }
}

#[cfg(test)]
mod sign_up_tests {
    use axum::http::{Method, StatusCode, header};
    use serde_json::json;

    use super::support::*;

    #[tokio::test]
    async fn test_sign_up_returns_sanitized_user_and_cookie() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signup",
                Some(json!({"name": "Alice", "email": "Alice@Example.com", "password": PASSWORD})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=86400"));

        let body = json(response).await;
        assert_eq!(body["message"], "Account created successfully");
        assert!(body["user"]["id"].as_i64().unwrap() > 0);
        assert_eq!(body["user"]["name"], "Alice");
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_any_case_rejected() {
        let repo = MemoryUserRepository::default();
        let app = app(repo.clone(), test_config());

        sign_up(&app, "Alice", "alice@example.com", None).await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signup",
                Some(json!({"name": "Other", "email": "ALICE@example.com", "password": PASSWORD})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_eq!(json(response).await["message"], "User already exists");
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_caught_by_store_when_precheck_misses() {
        let repo = StalePrecheckRepository::default();
        let app = app(repo.clone(), test_config());

        sign_up(&app, "Alice", "alice@example.com", None).await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signup",
                Some(json!({"name": "Other", "email": "Alice@Example.COM", "password": PASSWORD})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = json(response).await;
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["message"], "User already exists");
        assert_eq!(repo.inner.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_reports_every_field() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signup",
                Some(json!({"name": "A", "email": "not-an-email", "password": "short", "role": "root"})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"], "Bad Request");
        assert_eq!(body["message"], "Validation failed");

        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["name", "email", "password", "role"]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app(MemoryUserRepository::default(), test_config());

        let mut req = request(Method::POST, "/api/auth/signup", None, None);
        req.headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        *req.body_mut() = axum::body::Body::from("{not json");

        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["message"], "Validation failed");
    }

    #[tokio::test]
    async fn test_sign_up_as_admin() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signup",
                Some(json!({"name": "Root", "email": "root@example.com", "password": PASSWORD, "role": "admin"})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json(response).await["user"]["role"], "admin");
    }
}

#[cfg(test)]
mod sign_in_tests {
    use axum::http::{Method, StatusCode, header};
    use serde_json::json;

    use super::support::*;

    #[tokio::test]
    async fn test_sign_in_success() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (id, _) = sign_up(&app, "Alice", "alice@example.com", None).await;

        let response = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signin",
                Some(json!({"email": "ALICE@example.com", "password": PASSWORD})),
                None,
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let token = token_cookie(&response).unwrap();
        let body = json(response).await;
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["user"]["id"], id);

        // The new token authenticates
        let response = send(
            &app,
            request(Method::GET, &format!("/api/users/{id}"), None, Some(&token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_are_identical() {
        let app = app(MemoryUserRepository::default(), test_config());
        sign_up(&app, "Alice", "alice@example.com", None).await;

        let wrong_password = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signin",
                Some(json!({"email": "alice@example.com", "password": "Wrong-Horse-42"})),
                None,
            ),
        )
        .await;
        let unknown_email = send(
            &app,
            request(
                Method::POST,
                "/api/auth/signin",
                Some(json!({"email": "nobody@example.com", "password": PASSWORD})),
                None,
            ),
        )
        .await;

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());

        let a = json(wrong_password).await;
        let b = json(unknown_email).await;
        assert_eq!(a, b);
        assert_eq!(a["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_sign_in_requires_fields() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(Method::POST, "/api/auth/signin", Some(json!({})), None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sign_out_clears_cookie() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(&app, request(Method::POST, "/api/auth/signout", None, None)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert_eq!(json(response).await["message"], "Logout successful");
    }
}

#[cfg(test)]
mod guard_tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::http::{Method, StatusCode, header};
    use platform::token::TokenService;

    use super::support::*;
    use crate::application::config::AuthConfig;
    use crate::domain::entity::identity::Identity;
    use crate::domain::value_object::{user_id::UserId, user_role::UserRole};

    #[tokio::test]
    async fn test_missing_token() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(&app, request(Method::GET, "/api/users/1", None, None)).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json(response).await["message"],
            "Unauthorized: No token provided"
        );
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(Method::GET, "/api/users/1", None, Some("not.a.token")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["message"], "Unauthorized: Invalid token");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let config = test_config();
        let app = app(MemoryUserRepository::default(), config.clone());
        let (id, _) = sign_up(&app, "Alice", "alice@example.com", None).await;

        let identity = Identity {
            id: UserId::from_db(id),
            email: "alice@example.com".to_string(),
            role: UserRole::User,
        };
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        let stale = TokenService::new(&config.token)
            .issue_at(&identity, now - config.token.ttl().as_secs() - 5)
            .unwrap();

        let response = send(
            &app,
            request(Method::GET, &format!("/api/users/{id}"), None, Some(&stale)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_from_other_secret() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (id, _) = sign_up(&app, "Alice", "alice@example.com", None).await;

        let foreign = TokenService::new(&AuthConfig::with_random_secret().token)
            .issue(&Identity {
                id: UserId::from_db(id),
                email: "alice@example.com".to_string(),
                role: UserRole::Admin,
            })
            .unwrap();

        let response = send(
            &app,
            request(Method::GET, "/api/users", None, Some(&foreign)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bearer_header_fallback() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (id, token) = sign_up(&app, "Alice", "alice@example.com", None).await;

        let mut req = request(Method::GET, &format!("/api/users/{id}"), None, None);
        req.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );

        assert_eq!(send(&app, req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (_, user_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let (_, admin_token) = sign_up(&app, "Root", "root@example.com", Some("admin")).await;

        let response = send(
            &app,
            request(Method::GET, "/api/users", None, Some(&user_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Forbidden: Insufficient permissions"
        );

        let response = send(
            &app,
            request(Method::GET, "/api/users", None, Some(&admin_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["message"], "Successfully fetched users");
        assert_eq!(body["count"], 2);
        assert!(body["users"][0].get("password").is_none());
        assert!(body["users"][0]["created_at"].is_string());
    }
}

#[cfg(test)]
mod users_tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::support::*;

    #[tokio::test]
    async fn test_get_user() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (id, token) = sign_up(&app, "Alice", "alice@example.com", None).await;

        let response = send(
            &app,
            request(Method::GET, &format!("/api/users/{id}"), None, Some(&token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["message"], "Successfully fetched user");
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_invalid_and_missing_ids() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (_, token) = sign_up(&app, "Alice", "alice@example.com", None).await;

        for bad in ["abc", "0", "-1", "1.5"] {
            let response = send(
                &app,
                request(Method::GET, &format!("/api/users/{bad}"), None, Some(&token)),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{bad}");
            assert_eq!(json(response).await["message"], "Invalid user id");
        }

        let response = send(
            &app,
            request(Method::GET, "/api/users/999", None, Some(&token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["message"], "User not found");
    }

    #[tokio::test]
    async fn test_user_can_update_only_self() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (alice, alice_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let (bob, _) = sign_up(&app, "Bob", "bob@example.com", None).await;

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{bob}"),
                Some(json!({"name": "Mallory"})),
                Some(&alice_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Forbidden: You can only update your own information"
        );

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{alice}"),
                Some(json!({"name": "  Alice L.  ", "email": "ALICE.L@example.com"})),
                Some(&alice_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["message"], "Successfully updated user");
        assert_eq!(body["user"]["name"], "Alice L.");
        assert_eq!(body["user"]["email"], "alice.l@example.com");
    }

    #[tokio::test]
    async fn test_only_admin_changes_roles() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (alice, alice_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let (_, admin_token) = sign_up(&app, "Root", "root@example.com", Some("admin")).await;

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{alice}"),
                Some(json!({"role": "admin"})),
                Some(&alice_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Forbidden: Only admins can change user roles"
        );

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{alice}"),
                Some(json!({"role": "admin"})),
                Some(&admin_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn test_update_email_collision() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (alice, alice_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        sign_up(&app, "Bob", "bob@example.com", None).await;

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{alice}"),
                Some(json!({"email": "Bob@Example.com"})),
                Some(&alice_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_update_validation_and_missing_user() {
        let app = app(MemoryUserRepository::default(), test_config());
        let (alice, alice_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let (_, admin_token) = sign_up(&app, "Root", "root@example.com", Some("admin")).await;

        let response = send(
            &app,
            request(
                Method::PUT,
                &format!("/api/users/{alice}"),
                Some(json!({"name": "A", "role": "owner"})),
                Some(&alice_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["details"].as_array().unwrap().len(), 2);

        let response = send(
            &app,
            request(
                Method::PUT,
                "/api/users/4242",
                Some(json!({"name": "Ghost"})),
                Some(&admin_token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let repo = MemoryUserRepository::default();
        let app = app(repo.clone(), test_config());
        let (alice, alice_token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let (bob, _) = sign_up(&app, "Bob", "bob@example.com", None).await;
        let (_, admin_token) = sign_up(&app, "Root", "root@example.com", Some("admin")).await;

        let response = send(
            &app,
            request(Method::DELETE, &format!("/api/users/{bob}"), None, Some(&alice_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Forbidden: You can only delete your own account"
        );

        let response = send(
            &app,
            request(Method::DELETE, &format!("/api/users/{alice}"), None, Some(&alice_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["message"], "Successfully deleted user");

        let response = send(
            &app,
            request(Method::DELETE, &format!("/api/users/{bob}"), None, Some(&admin_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            request(Method::DELETE, &format!("/api/users/{bob}"), None, Some(&admin_token)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(repo.len(), 1);
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, StatusCode, header};
    use platform::client::RequestMetadata;
    use platform::rate_limit::{
        AuthDecision, DecisionEngine, DecisionError, RateLimitConfig, SlidingWindowEngine,
    };

    use super::support::*;
    use crate::application::rate_limit::{RateLimitPolicy, RateLimiter};
    use crate::presentation::router::auth_router_generic;

    /// Request arriving over a TCP connection from `ip`
    fn from_peer(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        req
    }

    fn forwarded_for(mut req: Request<Body>, ip: &str) -> Request<Body> {
        req.headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        req
    }

    fn signout() -> Request<Body> {
        request(Method::POST, "/api/auth/signout", None, None)
    }

    #[tokio::test]
    async fn test_guest_sixth_request_is_limited() {
        let app = app_with_policy(
            MemoryUserRepository::default(),
            test_config(),
            RateLimitPolicy::default(),
        );

        for _ in 0..5 {
            let response = send(&app, from_peer(signout(), [192, 0, 2, 10])).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, from_peer(signout(), [192, 0, 2, 10])).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(
            json(response).await["message"],
            "Guest request limit exceeded. Slow down"
        );

        // Another client is unaffected
        let response = send(&app, from_peer(signout(), [192, 0, 2, 11])).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rotating_forwarded_for_shares_peer_bucket() {
        let app = app_with_policy(
            MemoryUserRepository::default(),
            test_config(),
            RateLimitPolicy::default(),
        );

        let mut limited = 0;
        for i in 0..20 {
            let req = forwarded_for(from_peer(signout(), [203, 0, 113, 9]), &format!("10.0.0.{i}"));
            if send(&app, req).await.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }

        assert_eq!(limited, 15);
    }

    #[tokio::test]
    async fn test_trusted_forwarded_for_separates_clients() {
        let limiter = RateLimiter::new(
            Arc::new(SlidingWindowEngine::new()),
            RateLimitPolicy::default(),
        )
        .with_trusted_proxy_headers(true);
        let app = app_with_limiter(MemoryUserRepository::default(), test_config(), limiter);

        // Every request comes through the same proxy
        for _ in 0..5 {
            let req = forwarded_for(from_peer(signout(), [10, 0, 0, 1]), "198.51.100.1");
            assert_eq!(send(&app, req).await.status(), StatusCode::OK);
        }
        let req = forwarded_for(from_peer(signout(), [10, 0, 0, 1]), "198.51.100.1");
        assert_eq!(send(&app, req).await.status(), StatusCode::TOO_MANY_REQUESTS);

        let req = forwarded_for(from_peer(signout(), [10, 0, 0, 1]), "198.51.100.2");
        assert_eq!(send(&app, req).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_tier_quota() {
        let app = app_with_policy(
            MemoryUserRepository::default(),
            test_config(),
            RateLimitPolicy::default(),
        );

        // Sign up counts against the guest bucket
        let (id, token) = sign_up(&app, "Alice", "alice@example.com", None).await;
        let uri = format!("/api/users/{id}");

        for _ in 0..10 {
            let response = send(&app, request(Method::GET, &uri, None, Some(&token))).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = send(&app, request(Method::GET, &uri, None, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            json(response).await["message"],
            "User request limit exceeded. Slow down"
        );
    }

    #[tokio::test]
    async fn test_bot_blocked() {
        let app = app(MemoryUserRepository::default(), test_config());

        let mut req = request(Method::POST, "/api/auth/signout", None, None);
        req.headers_mut()
            .insert(header::USER_AGENT, "curl/8.4.0".parse().unwrap());

        let response = send(&app, req).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Automated requests are not allowed"
        );

        let mut req = request(Method::POST, "/api/auth/signout", None, None);
        req.headers_mut().remove(header::USER_AGENT);
        assert_eq!(send(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_shield_blocked() {
        let app = app(MemoryUserRepository::default(), test_config());

        let response = send(
            &app,
            request(Method::GET, "/api/users/%3Cscript%3Ealert(1)%3C%2Fscript%3E", None, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            json(response).await["message"],
            "Request blocked by security shield"
        );
    }

    struct FailingEngine;

    impl DecisionEngine for FailingEngine {
        async fn decide(
            &self,
            _key: &str,
            _limit: &RateLimitConfig,
            _request: &RequestMetadata,
        ) -> Result<AuthDecision, DecisionError> {
            Err(DecisionError::Unavailable("upstream timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn test_engine_failure_fails_closed() {
        let limiter = RateLimiter::new(Arc::new(FailingEngine), RateLimitPolicy::default());
        let app = Router::new().nest(
            "/api/auth",
            auth_router_generic(MemoryUserRepository::default(), test_config(), limiter),
        );

        let response = send(&app, request(Method::POST, "/api/auth/signout", None, None)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json(response).await["message"],
            "Something went wrong with security middleware"
        );
    }
}
