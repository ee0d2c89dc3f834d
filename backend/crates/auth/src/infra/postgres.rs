//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::error::conversions::is_unique_violation;
use sqlx::PgPool;

use crate::domain::entity::user::{NewUser, User, UserChanges};
use crate::domain::repository::UserRepository;
use crate::domain::value_object::{
    email::Email, user_id::UserId, user_name::UserName, user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = "id, name, email, password, role, created_at, updated_at";

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Classify a write error: unique violation on email becomes `EmailTaken`
fn map_write_error(err: sqlx::Error) -> AuthError {
    if is_unique_violation(&err) {
        AuthError::EmailTaken
    } else {
        AuthError::Database(err)
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgUserRepository {
    async fn create(&self, user: &NewUser) -> AuthResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.name.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(user.role.code())
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.into_user()
    }

    async fn find_by_id(&self, id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRow::into_user).transpose()
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = $1)",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn update(&self, id: UserId, changes: &UserChanges) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .bind(changes.name.as_ref().map(UserName::as_str))
        .bind(changes.email.as_ref().map(Email::as_str))
        .bind(changes.role.map(|r| r.code()))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        row.map(UserRow::into_user).transpose()
    }

    async fn delete(&self, id: UserId) -> AuthResult<bool> {
        let deleted = sqlx::query_scalar::<_, i64>("DELETE FROM users WHERE id = $1 RETURNING id")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(deleted.is_some())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let role = self
            .role
            .parse::<UserRole>()
            .map_err(|e| AuthError::Internal(format!("Invalid role in users.{}: {}", self.id, e)))?;

        Ok(User {
            id: UserId::from_db(self.id),
            name: UserName::from_db(self.name),
            email: Email::from_db(self.email),
            password: UserPassword::from_db(self.password)?,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
