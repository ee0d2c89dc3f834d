//! Error conversions
//!
//! Database error classification and the HTTP rendering of [`AppError`].

use super::app_error::AppError;

// ============================================================================
// SQLx helpers (feature-gated)
// ============================================================================

/// PostgreSQL の一意制約違反かどうかを判定
///
/// 重複登録の検出はデータベースの制約を唯一の根拠とします。
#[cfg(feature = "sqlx")]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() || db_err.code().as_deref() == Some("23505")
        }
        _ => false,
    }
}

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = serde_json::json!({
            "error": self.kind().as_str(),
            "message": self.message(),
        });
        if !self.details().is_empty() {
            body["details"] = serde_json::json!(self.details());
        }

        (status, Json(body)).into_response()
    }
}
