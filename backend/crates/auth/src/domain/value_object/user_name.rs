//! User Name Value Object
//!
//! 表示名。ログインには使用せず、一意性も要求しない。
//!
//! ## 不変条件
//! - 前後の空白を除去したうえで 2〜100 文字
//! - 制御文字を含まない

use kernel::error::app_error::FieldError;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Minimum length for user name (in characters)
pub const USER_NAME_MIN_LENGTH: usize = 2;

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 100;

/// Display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
    /// NFC-normalize, trim and validate
    pub fn new(raw: impl AsRef<str>) -> Result<Self, FieldError> {
        let normalized: String = raw.as_ref().nfc().collect();
        let name = normalized.trim();

        let len = name.chars().count();
        if len < USER_NAME_MIN_LENGTH {
            return Err(FieldError::new(
                "name",
                format!("Name must be at least {} characters", USER_NAME_MIN_LENGTH),
            ));
        }
        if len > USER_NAME_MAX_LENGTH {
            return Err(FieldError::new(
                "name",
                format!("Name must be at most {} characters", USER_NAME_MAX_LENGTH),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(FieldError::new("name", "Name contains invalid characters"));
        }

        Ok(Self(name.to_string()))
    }

    /// Create from database value (assumed already validated)
    pub fn from_db(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
